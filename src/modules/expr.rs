use std::collections::{BTreeMap, BTreeSet};

use num_bigint::BigUint;
use num_traits::One;
use thiserror::Error;

use crate::modules::etypes::EType;
use crate::modules::traversals::{TraversableTerm, TraversalError};
use crate::modules::types::{Addr, Expr, GVar, Prop, W256};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KindError {
  #[error("operand {position} of {node} must be {expected}, found {found}")]
  Operand { node: &'static str, position: usize, expected: EType, found: EType },

  #[error("expected a {expected} expression, found {found}")]
  Mismatch { expected: EType, found: EType },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubstError {
  #[error("no binding for {0}")]
  Unbound(GVar),

  #[error("{gvar} is bound to a {found} expression")]
  KindMismatch { gvar: GVar, found: EType },
}

// Kind checking ----------------------------------------------------------------------------------

pub fn expect_kind(expected: EType, e: &Expr) -> Result<(), KindError> {
  let found = e.kind();
  if found == expected {
    Ok(())
  } else {
    Err(KindError::Mismatch { expected, found })
  }
}

fn check_operands(e: &Expr) -> Result<(), KindError> {
  for (position, (expected, op)) in e.typed_operands().into_iter().enumerate() {
    let found = op.kind();
    if found != expected {
      return Err(KindError::Operand { node: e.tag(), position, expected, found });
    }
  }
  Ok(())
}

/// Accepts `e` only if each direct operand has the kind its position requires.
pub fn mk(e: Expr) -> Result<Expr, KindError> {
  check_operands(&e)?;
  Ok(e)
}

/// Every operand-kind violation anywhere in `t`, in pre-order.
pub fn kind_errors<T: TraversableTerm>(t: &T) -> Vec<KindError> {
  t.fold_term(&mut |e: &Expr| check_operands(e).err().into_iter().collect::<Vec<_>>(), Vec::new())
}

pub fn validate<T: TraversableTerm>(t: &T) -> Result<(), KindError> {
  match kind_errors(t).into_iter().next() {
    Some(err) => Err(err),
    None => Ok(()),
  }
}

/// Like `validate`, and additionally requires ordering atoms to compare words and equalities to
/// compare expressions of the same kind.
pub fn validate_prop(p: &Prop) -> Result<(), KindError> {
  check_atoms(p)?;
  validate(p)
}

fn check_atoms(p: &Prop) -> Result<(), KindError> {
  match p {
    Prop::PEq(a, b) => expect_kind(a.kind(), b),
    Prop::PLT(a, b) | Prop::PGT(a, b) | Prop::PGEq(a, b) | Prop::PLEq(a, b) => {
      expect_kind(EType::Word, a)?;
      expect_kind(EType::Word, b)
    }
    Prop::PNeg(a) => check_atoms(a),
    Prop::PAnd(a, b) | Prop::POr(a, b) | Prop::PImpl(a, b) => {
      check_atoms(a)?;
      check_atoms(b)
    }
    Prop::PBool(_) => Ok(()),
  }
}

// Smart constructors -----------------------------------------------------------------------------

pub fn lit(n: u64) -> Expr {
  Expr::Lit(W256::from(n))
}

pub fn var(name: &str) -> Expr {
  Expr::Var(name.to_string())
}

pub fn sym_addr(name: &str) -> Expr {
  Expr::SymAddr(name.to_string())
}

pub fn lit_addr(addr: impl Into<Addr>) -> Expr {
  Expr::LitAddr(addr.into())
}

pub fn abstract_buf(name: &str) -> Expr {
  Expr::AbstractBuf(name.to_string())
}

pub fn conc_buf(bytes: &[u8]) -> Expr {
  Expr::ConcreteBuf(bytes.to_vec())
}

macro_rules! unary_ops {
  ($($name:ident => $ctor:ident),* $(,)?) => {
    $(
      pub fn $name(a: Expr) -> Result<Expr, KindError> {
        mk(Expr::$ctor(Box::new(a)))
      }
    )*
  };
}

macro_rules! binary_ops {
  ($($name:ident => $ctor:ident),* $(,)?) => {
    $(
      pub fn $name(a: Expr, b: Expr) -> Result<Expr, KindError> {
        mk(Expr::$ctor(Box::new(a), Box::new(b)))
      }
    )*
  };
}

macro_rules! ternary_ops {
  ($($name:ident => $ctor:ident),* $(,)?) => {
    $(
      pub fn $name(a: Expr, b: Expr, c: Expr) -> Result<Expr, KindError> {
        mk(Expr::$ctor(Box::new(a), Box::new(b), Box::new(c)))
      }
    )*
  };
}

unary_ops!(
  is_zero => IsZero,
  not => Not,
  keccak => Keccak,
  sha256 => SHA256,
  block_hash => BlockHash,
  code_size => CodeSize,
  code_hash => CodeHash,
  waddr => WAddr,
  buf_length => BufLength,
);

binary_ops!(
  index_word => IndexWord,
  eq_byte => EqByte,
  add => Add,
  sub => Sub,
  mul => Mul,
  div => Div,
  sdiv => SDiv,
  modulo => Mod,
  smod => SMod,
  exp => Exp,
  sex => SEx,
  min => Min,
  max => Max,
  lt => LT,
  gt => GT,
  leq => LEq,
  geq => GEq,
  slt => SLT,
  sgt => SGT,
  eq => Eq,
  and => And,
  or => Or,
  xor => Xor,
  shl => SHL,
  shr => SHR,
  sar => SAR,
  read_word => ReadWord,
  read_byte => ReadByte,
);

ternary_ops!(
  add_mod => AddMod,
  mul_mod => MulMod,
  ite => ITE,
  sload => SLoad,
  write_word => WriteWord,
  write_byte => WriteByte,
);

pub fn join_bytes(bytes: [Expr; 32]) -> Result<Expr, KindError> {
  mk(Expr::JoinBytes(Box::new(bytes)))
}

pub fn sstore(addr: Expr, slot: Expr, val: Expr, store: Expr) -> Result<Expr, KindError> {
  mk(Expr::SStore(Box::new(addr), Box::new(slot), Box::new(val), Box::new(store)))
}

pub fn copy_slice(src_off: Expr, dst_off: Expr, size: Expr, src: Expr, dst: Expr) -> Result<Expr, KindError> {
  mk(Expr::CopySlice(Box::new(src_off), Box::new(dst_off), Box::new(size), Box::new(src), Box::new(dst)))
}

pub fn abstract_store(addr: Expr, idx: Option<W256>) -> Result<Expr, KindError> {
  mk(Expr::AbstractStore(Box::new(addr), idx))
}

pub fn log_entry(addr: Expr, data: Expr, topics: Vec<Expr>) -> Result<Expr, KindError> {
  mk(Expr::LogEntry(Box::new(addr), Box::new(data), topics))
}

/// `0 <= e < 2^sz`
pub fn in_range(sz: u32, e: Expr) -> Prop {
  let bound = W256::from_biguint(&((BigUint::one() << sz as usize) - BigUint::one()));
  Prop::PAnd(Box::new(Prop::PGEq(e.clone(), Expr::Lit(W256::ZERO))), Box::new(Prop::PLEq(e, Expr::Lit(bound))))
}

// Queries ----------------------------------------------------------------------------------------

pub fn referenced_vars<T: TraversableTerm>(t: &T) -> BTreeSet<String> {
  t.fold_term(
    &mut |e: &Expr| match e {
      Expr::Var(name) => BTreeSet::from([name.clone()]),
      _ => BTreeSet::new(),
    },
    BTreeSet::new(),
  )
}

pub fn referenced_bufs<T: TraversableTerm>(t: &T) -> BTreeSet<String> {
  t.fold_term(
    &mut |e: &Expr| match e {
      Expr::AbstractBuf(name) => BTreeSet::from([name.clone()]),
      _ => BTreeSet::new(),
    },
    BTreeSet::new(),
  )
}

pub fn referenced_gvars<T: TraversableTerm>(t: &T) -> BTreeSet<GVar> {
  t.fold_term(
    &mut |e: &Expr| match e {
      Expr::GVar(g) => BTreeSet::from([*g]),
      _ => BTreeSet::new(),
    },
    BTreeSet::new(),
  )
}

pub fn referenced_abstract_stores<T: TraversableTerm>(t: &T) -> BTreeSet<Expr> {
  t.fold_term(
    &mut |e: &Expr| match e {
      Expr::AbstractStore(..) => BTreeSet::from([e.clone()]),
      _ => BTreeSet::new(),
    },
    BTreeSet::new(),
  )
}

pub fn referenced_waddrs<T: TraversableTerm>(t: &T) -> BTreeSet<Expr> {
  t.fold_term(
    &mut |e: &Expr| match e {
      Expr::WAddr(_) => BTreeSet::from([e.clone()]),
      _ => BTreeSet::new(),
    },
    BTreeSet::new(),
  )
}

/// Number of expression nodes reachable from `t`, embedded ones included.
pub fn count_nodes<T: TraversableTerm>(t: &T) -> usize {
  t.fold_term(&mut |_: &Expr| 1usize, 0)
}

pub fn contains<T: TraversableTerm>(t: &T, needle: &Expr) -> bool {
  t.fold_term(&mut |e: &Expr| usize::from(e == needle), 0) > 0
}

// Substitution -----------------------------------------------------------------------------------

/// Replaces every `Var(name)` with `with`, which must be a word.
pub fn subst_var<T: TraversableTerm>(t: &T, name: &str, with: &Expr) -> Result<T, KindError> {
  expect_kind(EType::Word, with)?;
  Ok(t.map_term(|e| match e {
    Expr::Var(ref v) if v == name => with.clone(),
    e => e,
  }))
}

/// Replaces every placeholder with its binding in `env`. Fails on the first unbound placeholder
/// or on a binding of the wrong kind.
pub fn subst_gvars<T: TraversableTerm>(t: &T, env: &BTreeMap<GVar, Expr>) -> Result<T, TraversalError<SubstError>> {
  t.map_term_m(&mut |e: Expr| match e {
    Expr::GVar(g) => match env.get(&g) {
      Some(bound) if bound.kind() == g.kind => Ok(bound.clone()),
      Some(bound) => Err(SubstError::KindMismatch { gvar: g, found: bound.kind() }),
      None => Err(SubstError::Unbound(g)),
    },
    e => Ok(e),
  })
}

/// Gives every free variable a fresh name `{prefix}{n}`, numbered in order of first rewrite.
/// Returns the renamed term and the old-to-new name table.
pub fn alpha_rename<T: TraversableTerm>(t: &T, prefix: &str) -> (T, BTreeMap<String, String>) {
  let mut names: BTreeMap<String, String> = BTreeMap::new();
  let renamed = t.map_term(|e| match e {
    Expr::Var(v) => {
      let next = names.len();
      let fresh = names.entry(v).or_insert_with(|| format!("{}{}", prefix, next));
      Expr::Var(fresh.clone())
    }
    e => e,
  });
  (renamed, names)
}
