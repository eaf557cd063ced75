// Module: rhoexpr::traversals
// Description: Generic fold and map over Expr and every structure that embeds one

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::convert::Infallible;
use std::hash::Hash;

use log::warn;
use thiserror::Error;

use crate::modules::config::TraversalConfig;
use crate::modules::etypes::EType;
use crate::modules::types::{
  Contract, ContractCode, EvmError, Expr, FrameContext, PartialExec, Prop, RuntimeCodeStruct, SubState, Trace,
  TraceData, Traces, Tree,
};

// Accumulators -----------------------------------------------------------------------------------

/// Associative combine with an identity element. Fold results are built with it.
pub trait Monoid: Sized {
  fn empty() -> Self;
  fn combine(self, other: Self) -> Self;
}

impl<T> Monoid for Vec<T> {
  fn empty() -> Self {
    Vec::new()
  }

  fn combine(mut self, other: Self) -> Self {
    self.extend(other);
    self
  }
}

impl<T: Ord> Monoid for BTreeSet<T> {
  fn empty() -> Self {
    BTreeSet::new()
  }

  fn combine(mut self, mut other: Self) -> Self {
    self.append(&mut other);
    self
  }
}

impl<T: Eq + Hash> Monoid for HashSet<T> {
  fn empty() -> Self {
    HashSet::new()
  }

  fn combine(mut self, other: Self) -> Self {
    self.extend(other);
    self
  }
}

impl Monoid for String {
  fn empty() -> Self {
    String::new()
  }

  fn combine(mut self, other: Self) -> Self {
    self.push_str(&other);
    self
  }
}

impl Monoid for () {
  fn empty() -> Self {}

  fn combine(self, _other: Self) -> Self {}
}

macro_rules! sum_monoid {
  ($($t:ty),*) => {
    $(
      impl Monoid for $t {
        fn empty() -> Self {
          0
        }

        fn combine(self, other: Self) -> Self {
          self + other
        }
      }
    )*
  };
}

sum_monoid!(u32, u64, usize, i32, i64);

impl<A: Monoid, B: Monoid> Monoid for (A, B) {
  fn empty() -> Self {
    (A::empty(), B::empty())
  }

  fn combine(self, other: Self) -> Self {
    (self.0.combine(other.0), self.1.combine(other.1))
  }
}

// Errors -----------------------------------------------------------------------------------------

/// Why a traversal stopped. `E` is the error type of an effectful map visitor; folds and pure maps
/// use the default `Infallible`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraversalError<E = Infallible> {
  #[error("visitor failed: {0}")]
  Visitor(E),

  #[error("expression nesting exceeds the traversal limit of {limit}")]
  DepthExceeded { limit: usize },

  #[error("rewriting {node} changed its kind from {expected} to {found}")]
  KindChanged { node: &'static str, expected: EType, found: EType },
}

impl<E> TraversalError<E> {
  /// The visitor's own error, if that is what stopped the traversal.
  pub fn into_visitor(self) -> Option<E> {
    match self {
      TraversalError::Visitor(e) => Some(e),
      TraversalError::DepthExceeded { .. } | TraversalError::KindChanged { .. } => None,
    }
  }
}

type FoldResult<B> = Result<B, TraversalError>;
type MapResult<T, E> = Result<T, TraversalError<E>>;

// Unwraps the result of a traversal whose visitor cannot fail.
fn within_bounds<T>(result: Result<T, TraversalError>) -> T {
  match result {
    Ok(t) => t,
    Err(TraversalError::Visitor(never)) => match never {},
    Err(err) => panic!("{}", err),
  }
}

// Recursive steps switch to a fresh stack segment when less than the red zone is left, so
// `max_depth` bounds a traversal rather than the caller's thread stack.
const STACK_RED_ZONE: usize = 1024 * 1024;
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

struct Depth {
  current: usize,
  limit: usize,
}

impl Depth {
  fn new(config: &TraversalConfig) -> Self {
    Depth { current: 0, limit: config.max_depth }
  }

  fn enter<E>(&mut self) -> Result<(), TraversalError<E>> {
    if self.current >= self.limit {
      warn!("traversal aborted: nesting exceeds {} levels", self.limit);
      return Err(TraversalError::DepthExceeded { limit: self.limit });
    }
    self.current += 1;
    Ok(())
  }

  fn leave(&mut self) {
    self.current -= 1;
  }
}

// Fold -------------------------------------------------------------------------------------------

// Pre-order: the visitor sees a node before any of its operands, operands left to right.
struct Folder<'f, F> {
  f: &'f mut F,
  depth: Depth,
}

impl<'f, B, F> Folder<'f, F>
where
  B: Monoid,
  F: FnMut(&Expr) -> B,
{
  fn new(config: &TraversalConfig, f: &'f mut F) -> Self {
    Folder { f, depth: Depth::new(config) }
  }

  fn expr(&mut self, acc: B, e: &Expr) -> FoldResult<B> {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.expr_inner(acc, e))
  }

  fn expr_inner(&mut self, acc: B, e: &Expr) -> FoldResult<B> {
    self.depth.enter::<Infallible>()?;
    let acc = acc.combine((self.f)(e));
    let acc = self.operands(acc, e)?;
    self.depth.leave();
    Ok(acc)
  }

  fn exprs<'e>(&mut self, mut acc: B, es: impl IntoIterator<Item = &'e Expr>) -> FoldResult<B> {
    for e in es {
      acc = self.expr(acc, e)?;
    }
    Ok(acc)
  }

  fn operands(&mut self, acc: B, e: &Expr) -> FoldResult<B> {
    match e {
      Expr::Lit(_)
      | Expr::Var(_)
      | Expr::GVar(_)
      | Expr::LitByte(_)
      | Expr::Origin
      | Expr::Coinbase
      | Expr::Timestamp
      | Expr::BlockNumber
      | Expr::PrevRandao
      | Expr::GasLimit
      | Expr::ChainId
      | Expr::BaseFee
      | Expr::TxValue
      | Expr::Balance(_)
      | Expr::Gas(..)
      | Expr::SymAddr(_)
      | Expr::LitAddr(_)
      | Expr::ConcreteStore(_)
      | Expr::ConcreteBuf(_)
      | Expr::AbstractBuf(_) => Ok(acc),

      Expr::JoinBytes(bytes) => self.exprs(acc, bytes.iter()),

      Expr::Partial(props, traces, exec) => {
        let acc = self.props(acc, props)?;
        let acc = self.traces(acc, traces)?;
        self.partial_exec(acc, exec)
      }
      Expr::Failure(props, traces, err) => {
        let acc = self.props(acc, props)?;
        let acc = self.traces(acc, traces)?;
        self.evm_error(acc, err)
      }
      Expr::Success(props, traces, buf, contracts) => {
        let acc = self.props(acc, props)?;
        let acc = self.traces(acc, traces)?;
        let acc = self.expr(acc, buf)?;
        self.exprs(acc, contracts.iter().flat_map(|(k, v)| [k, v]))
      }

      Expr::IndexWord(a, b)
      | Expr::EqByte(a, b)
      | Expr::Add(a, b)
      | Expr::Sub(a, b)
      | Expr::Mul(a, b)
      | Expr::Div(a, b)
      | Expr::SDiv(a, b)
      | Expr::Mod(a, b)
      | Expr::SMod(a, b)
      | Expr::Exp(a, b)
      | Expr::SEx(a, b)
      | Expr::Min(a, b)
      | Expr::Max(a, b)
      | Expr::LT(a, b)
      | Expr::GT(a, b)
      | Expr::LEq(a, b)
      | Expr::GEq(a, b)
      | Expr::SLT(a, b)
      | Expr::SGT(a, b)
      | Expr::Eq(a, b)
      | Expr::And(a, b)
      | Expr::Or(a, b)
      | Expr::Xor(a, b)
      | Expr::SHL(a, b)
      | Expr::SHR(a, b)
      | Expr::SAR(a, b)
      | Expr::ReadWord(a, b)
      | Expr::ReadByte(a, b) => self.exprs(acc, [&**a, &**b]),

      Expr::ITE(a, b, c)
      | Expr::AddMod(a, b, c)
      | Expr::MulMod(a, b, c)
      | Expr::SLoad(a, b, c)
      | Expr::WriteWord(a, b, c)
      | Expr::WriteByte(a, b, c) => self.exprs(acc, [&**a, &**b, &**c]),

      Expr::IsZero(a)
      | Expr::Not(a)
      | Expr::Keccak(a)
      | Expr::SHA256(a)
      | Expr::BlockHash(a)
      | Expr::CodeSize(a)
      | Expr::CodeHash(a)
      | Expr::WAddr(a)
      | Expr::BufLength(a)
      | Expr::AbstractStore(a, _) => self.expr(acc, a),

      Expr::SStore(a, b, c, d) => self.exprs(acc, [&**a, &**b, &**c, &**d]),
      Expr::CopySlice(a, b, c, d, e) => self.exprs(acc, [&**a, &**b, &**c, &**d, &**e]),

      Expr::LogEntry(addr, data, topics) => self.exprs(acc, [&**addr, &**data].into_iter().chain(topics)),

      Expr::C { code, storage, balance, .. } => {
        let acc = self.code(acc, code)?;
        self.exprs(acc, [&**storage, &**balance])
      }

      Expr::Create { value, offset, size, memory, logs, storage, cont } => {
        let head = [&**value, &**offset, &**size, &**memory];
        self.exprs(acc, head.into_iter().chain(logs).chain([&**storage, &**cont]))
      }
      Expr::Create2 { value, offset, size, salt, memory, logs, storage, cont } => {
        let head = [&**value, &**offset, &**size, &**salt, &**memory];
        self.exprs(acc, head.into_iter().chain(logs).chain([&**storage, &**cont]))
      }
      Expr::Call { gas, target, value, args, ret_offset, ret_size, logs, cont }
      | Expr::CallCode { gas, target, value, args, ret_offset, ret_size, logs, cont } => {
        let acc = self.expr(acc, gas)?;
        let rest = [&**value, &**args, &**ret_offset, &**ret_size];
        self.exprs(acc, target.as_deref().into_iter().chain(rest).chain(logs).chain([&**cont]))
      }
      Expr::DelegateCall { gas, target, args, ret_offset, ret_size, logs, cont }
      | Expr::StaticCall { gas, target, args, ret_offset, ret_size, logs, cont } => {
        let acc = self.expr(acc, gas)?;
        let rest = [&**args, &**ret_offset, &**ret_size];
        self.exprs(acc, target.as_deref().into_iter().chain(rest).chain(logs).chain([&**cont]))
      }
    }
  }

  fn props(&mut self, mut acc: B, ps: &[Prop]) -> FoldResult<B> {
    for p in ps {
      acc = self.prop(acc, p)?;
    }
    Ok(acc)
  }

  fn prop(&mut self, acc: B, p: &Prop) -> FoldResult<B> {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.prop_inner(acc, p))
  }

  fn prop_inner(&mut self, acc: B, p: &Prop) -> FoldResult<B> {
    self.depth.enter::<Infallible>()?;
    let acc = match p {
      Prop::PBool(_) => acc,
      Prop::PEq(a, b) | Prop::PLT(a, b) | Prop::PGT(a, b) | Prop::PGEq(a, b) | Prop::PLEq(a, b) => {
        self.exprs(acc, [a, b])?
      }
      Prop::PNeg(a) => self.prop(acc, a)?,
      Prop::PAnd(a, b) | Prop::POr(a, b) | Prop::PImpl(a, b) => {
        let acc = self.prop(acc, a)?;
        self.prop(acc, b)?
      }
    };
    self.depth.leave();
    Ok(acc)
  }

  fn code(&mut self, acc: B, code: &ContractCode) -> FoldResult<B> {
    match code {
      ContractCode::UnKnownCode(addr) => self.expr(acc, addr),
      ContractCode::InitCode(_, buf) => self.expr(acc, buf),
      ContractCode::RuntimeCode(RuntimeCodeStruct::ConcreteRuntimeCode(_)) => Ok(acc),
      ContractCode::RuntimeCode(RuntimeCodeStruct::SymbolicRuntimeCode(ops)) => self.exprs(acc, ops),
    }
  }

  fn contract(&mut self, acc: B, c: &Contract) -> FoldResult<B> {
    let acc = self.code(acc, &c.code)?;
    self.exprs(acc, [&c.storage, &c.orig_storage, &c.balance])
  }

  fn contract_map(&mut self, mut acc: B, m: &BTreeMap<Expr, Contract>) -> FoldResult<B> {
    for (addr, c) in m {
      acc = self.expr(acc, addr)?;
      acc = self.contract(acc, c)?;
    }
    Ok(acc)
  }

  fn traces(&mut self, mut acc: B, t: &Traces) -> FoldResult<B> {
    for tree in &t.traces {
      acc = self.trace_tree(acc, tree)?;
    }
    self.contract_map(acc, &t.contracts)
  }

  fn trace_tree(&mut self, acc: B, tree: &Tree<Trace>) -> FoldResult<B> {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.trace_tree_inner(acc, tree))
  }

  fn trace_tree_inner(&mut self, acc: B, tree: &Tree<Trace>) -> FoldResult<B> {
    self.depth.enter::<Infallible>()?;
    let mut acc = self.trace(acc, &tree.value)?;
    for child in &tree.children {
      acc = self.trace_tree(acc, child)?;
    }
    self.depth.leave();
    Ok(acc)
  }

  fn trace(&mut self, acc: B, t: &Trace) -> FoldResult<B> {
    let acc = self.contract(acc, &t.contract)?;
    match &t.tracedata {
      TraceData::EventTrace(addr, data, topics) => self.exprs(acc, [addr, data].into_iter().chain(topics)),
      TraceData::FrameTrace(ctx) => self.frame_context(acc, ctx),
      TraceData::ErrorTrace(err) => self.evm_error(acc, err),
      TraceData::EntryTrace(_) => Ok(acc),
      TraceData::ReturnTrace(buf, ctx) => {
        let acc = self.expr(acc, buf)?;
        self.frame_context(acc, ctx)
      }
    }
  }

  fn frame_context(&mut self, acc: B, ctx: &FrameContext) -> FoldResult<B> {
    match ctx {
      FrameContext::CreationContext { address, codehash, create_reversion, substate } => {
        let acc = self.exprs(acc, [address, codehash])?;
        let acc = self.contract_map(acc, create_reversion)?;
        self.substate(acc, substate)
      }
      FrameContext::CallContext { target, context, codehash, calldata, call_reversion, substate, .. } => {
        let acc = self.exprs(acc, [target, context, codehash, calldata])?;
        let acc = self.contract_map(acc, call_reversion)?;
        self.substate(acc, substate)
      }
    }
  }

  fn substate(&mut self, acc: B, s: &SubState) -> FoldResult<B> {
    let acc = self.exprs(acc, &s.selfdestructs)?;
    let acc = self.exprs(acc, &s.touched_accounts)?;
    let acc = self.exprs(acc, &s.accessed_addresses)?;
    let acc = self.exprs(acc, s.accessed_storage_keys.iter().map(|(addr, _)| addr))?;
    self.exprs(acc, s.refunds.iter().map(|(addr, _)| addr))
  }

  fn evm_error(&mut self, acc: B, err: &EvmError) -> FoldResult<B> {
    match err {
      EvmError::BalanceTooLow(a, b) => self.exprs(acc, [&**a, &**b]),
      EvmError::Revert(buf) => self.expr(acc, buf),
      EvmError::MaxInitCodeSizeExceeded(_, size) => self.expr(acc, size),
      EvmError::UnrecognizedOpcode(_)
      | EvmError::SelfDestruction
      | EvmError::StackUnderrun
      | EvmError::BadJumpDestination
      | EvmError::OutOfGas(..)
      | EvmError::StackLimitExceeded
      | EvmError::IllegalOverflow
      | EvmError::StateChangeWhileStatic
      | EvmError::InvalidMemoryAccess
      | EvmError::CallDepthLimitReached
      | EvmError::MaxCodeSizeExceeded(..)
      | EvmError::InvalidFormat
      | EvmError::PrecompileFailure
      | EvmError::ReturnDataOutOfBounds
      | EvmError::NonceOverflow
      | EvmError::BadCheatCode(_)
      | EvmError::NonexistentFork(_) => Ok(acc),
    }
  }

  fn partial_exec(&mut self, acc: B, exec: &PartialExec) -> FoldResult<B> {
    match exec {
      PartialExec::UnexpectedSymbolicArg { args, .. } => self.exprs(acc, args),
      PartialExec::MaxIterationsReached { addr, .. } => self.expr(acc, addr),
      PartialExec::JumpIntoSymbolicCode { .. } => Ok(acc),
    }
  }
}

// Map --------------------------------------------------------------------------------------------

// Bottom-up: operands are rewritten first, the node is rebuilt with the same shape, and the
// visitor is applied to the rebuilt node. The first visitor error aborts the whole rewrite.
struct Mapper<'f, F> {
  f: &'f mut F,
  depth: Depth,
  check_kinds: bool,
}

type Unary = fn(Box<Expr>) -> Expr;
type Binary = fn(Box<Expr>, Box<Expr>) -> Expr;
type Ternary = fn(Box<Expr>, Box<Expr>, Box<Expr>) -> Expr;

impl<'f, E, F> Mapper<'f, F>
where
  F: FnMut(Expr) -> Result<Expr, E>,
{
  fn new(config: &TraversalConfig, f: &'f mut F) -> Self {
    Mapper { f, depth: Depth::new(config), check_kinds: config.check_kinds }
  }

  fn expr(&mut self, e: &Expr) -> MapResult<Expr, E> {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.expr_inner(e))
  }

  fn expr_inner(&mut self, e: &Expr) -> MapResult<Expr, E> {
    self.depth.enter::<E>()?;
    let rebuilt = self.rebuild(e)?;
    self.depth.leave();
    self.visit(rebuilt)
  }

  fn visit(&mut self, e: Expr) -> MapResult<Expr, E> {
    let (node, expected) = (e.tag(), e.kind());
    let out = (self.f)(e).map_err(TraversalError::Visitor)?;
    if self.check_kinds && out.kind() != expected {
      return Err(TraversalError::KindChanged { node, expected, found: out.kind() });
    }
    Ok(out)
  }

  fn boxed(&mut self, e: &Expr) -> MapResult<Box<Expr>, E> {
    self.expr(e).map(Box::new)
  }

  fn exprs<'e>(&mut self, es: impl IntoIterator<Item = &'e Expr>) -> MapResult<Vec<Expr>, E> {
    let mut out = Vec::new();
    for e in es {
      out.push(self.expr(e)?);
    }
    Ok(out)
  }

  fn optional(&mut self, e: Option<&Expr>) -> MapResult<Option<Box<Expr>>, E> {
    match e {
      Some(e) => self.boxed(e).map(Some),
      None => Ok(None),
    }
  }

  fn unary(&mut self, mk: Unary, a: &Expr) -> MapResult<Expr, E> {
    Ok(mk(self.boxed(a)?))
  }

  fn binary(&mut self, mk: Binary, a: &Expr, b: &Expr) -> MapResult<Expr, E> {
    let a = self.boxed(a)?;
    Ok(mk(a, self.boxed(b)?))
  }

  fn ternary(&mut self, mk: Ternary, a: &Expr, b: &Expr, c: &Expr) -> MapResult<Expr, E> {
    let a = self.boxed(a)?;
    let b = self.boxed(b)?;
    Ok(mk(a, b, self.boxed(c)?))
  }

  // One arm per constructor; anything with more than a couple of steps lives in its own helper.
  fn rebuild(&mut self, e: &Expr) -> MapResult<Expr, E> {
    match e {
      Expr::Lit(_)
      | Expr::Var(_)
      | Expr::GVar(_)
      | Expr::LitByte(_)
      | Expr::Origin
      | Expr::Coinbase
      | Expr::Timestamp
      | Expr::BlockNumber
      | Expr::PrevRandao
      | Expr::GasLimit
      | Expr::ChainId
      | Expr::BaseFee
      | Expr::TxValue
      | Expr::Balance(_)
      | Expr::Gas(..)
      | Expr::SymAddr(_)
      | Expr::LitAddr(_)
      | Expr::ConcreteStore(_)
      | Expr::ConcreteBuf(_)
      | Expr::AbstractBuf(_) => Ok(e.clone()),

      Expr::IndexWord(a, b) => self.binary(Expr::IndexWord, a, b),
      Expr::EqByte(a, b) => self.binary(Expr::EqByte, a, b),
      Expr::JoinBytes(bytes) => self.join_bytes(bytes),

      Expr::Partial(props, traces, exec) => self.partial(props, traces, exec),
      Expr::Failure(props, traces, err) => self.failure(props, traces, err),
      Expr::Success(props, traces, buf, contracts) => self.success(props, traces, buf, contracts),
      Expr::ITE(c, t, f) => self.ternary(Expr::ITE, c, t, f),

      Expr::Add(a, b) => self.binary(Expr::Add, a, b),
      Expr::Sub(a, b) => self.binary(Expr::Sub, a, b),
      Expr::Mul(a, b) => self.binary(Expr::Mul, a, b),
      Expr::Div(a, b) => self.binary(Expr::Div, a, b),
      Expr::SDiv(a, b) => self.binary(Expr::SDiv, a, b),
      Expr::Mod(a, b) => self.binary(Expr::Mod, a, b),
      Expr::SMod(a, b) => self.binary(Expr::SMod, a, b),
      Expr::AddMod(a, b, c) => self.ternary(Expr::AddMod, a, b, c),
      Expr::MulMod(a, b, c) => self.ternary(Expr::MulMod, a, b, c),
      Expr::Exp(a, b) => self.binary(Expr::Exp, a, b),
      Expr::SEx(a, b) => self.binary(Expr::SEx, a, b),
      Expr::Min(a, b) => self.binary(Expr::Min, a, b),
      Expr::Max(a, b) => self.binary(Expr::Max, a, b),

      Expr::LT(a, b) => self.binary(Expr::LT, a, b),
      Expr::GT(a, b) => self.binary(Expr::GT, a, b),
      Expr::LEq(a, b) => self.binary(Expr::LEq, a, b),
      Expr::GEq(a, b) => self.binary(Expr::GEq, a, b),
      Expr::SLT(a, b) => self.binary(Expr::SLT, a, b),
      Expr::SGT(a, b) => self.binary(Expr::SGT, a, b),
      Expr::Eq(a, b) => self.binary(Expr::Eq, a, b),
      Expr::IsZero(a) => self.unary(Expr::IsZero, a),

      Expr::And(a, b) => self.binary(Expr::And, a, b),
      Expr::Or(a, b) => self.binary(Expr::Or, a, b),
      Expr::Xor(a, b) => self.binary(Expr::Xor, a, b),
      Expr::Not(a) => self.unary(Expr::Not, a),
      Expr::SHL(a, b) => self.binary(Expr::SHL, a, b),
      Expr::SHR(a, b) => self.binary(Expr::SHR, a, b),
      Expr::SAR(a, b) => self.binary(Expr::SAR, a, b),

      Expr::Keccak(a) => self.unary(Expr::Keccak, a),
      Expr::SHA256(a) => self.unary(Expr::SHA256, a),
      Expr::BlockHash(a) => self.unary(Expr::BlockHash, a),
      Expr::CodeSize(a) => self.unary(Expr::CodeSize, a),
      Expr::CodeHash(a) => self.unary(Expr::CodeHash, a),

      Expr::LogEntry(addr, data, topics) => self.log_entry(addr, data, topics),
      Expr::C { code, storage, balance, nonce } => self.contract_expr(code, storage, balance, *nonce),

      Expr::WAddr(a) => self.unary(Expr::WAddr, a),

      Expr::AbstractStore(addr, idx) => Ok(Expr::AbstractStore(self.boxed(addr)?, *idx)),
      Expr::SLoad(a, b, c) => self.ternary(Expr::SLoad, a, b, c),
      Expr::SStore(a, b, c, d) => self.sstore(a, b, c, d),

      Expr::ReadWord(a, b) => self.binary(Expr::ReadWord, a, b),
      Expr::ReadByte(a, b) => self.binary(Expr::ReadByte, a, b),
      Expr::WriteWord(a, b, c) => self.ternary(Expr::WriteWord, a, b, c),
      Expr::WriteByte(a, b, c) => self.ternary(Expr::WriteByte, a, b, c),
      Expr::CopySlice(a, b, c, d, e) => self.copy_slice([&**a, &**b, &**c, &**d, &**e]),
      Expr::BufLength(a) => self.unary(Expr::BufLength, a),

      Expr::Create { value, offset, size, memory, logs, storage, cont } => {
        self.create(value, offset, size, memory, logs, storage, cont)
      }
      Expr::Create2 { value, offset, size, salt, memory, logs, storage, cont } => {
        self.create2([&**value, &**offset, &**size, &**salt, &**memory], logs, storage, cont)
      }
      Expr::Call { gas, target, value, args, ret_offset, ret_size, logs, cont } => {
        self.call(false, gas, target.as_deref(), value, [&**args, &**ret_offset, &**ret_size], logs, cont)
      }
      Expr::CallCode { gas, target, value, args, ret_offset, ret_size, logs, cont } => {
        self.call(true, gas, target.as_deref(), value, [&**args, &**ret_offset, &**ret_size], logs, cont)
      }
      Expr::DelegateCall { gas, target, args, ret_offset, ret_size, logs, cont } => {
        self.delegate(false, gas, target.as_deref(), [&**args, &**ret_offset, &**ret_size], logs, cont)
      }
      Expr::StaticCall { gas, target, args, ret_offset, ret_size, logs, cont } => {
        self.delegate(true, gas, target.as_deref(), [&**args, &**ret_offset, &**ret_size], logs, cont)
      }
    }
  }

  fn join_bytes(&mut self, bytes: &[Expr; 32]) -> MapResult<Expr, E> {
    let mut failed = None;
    // once a byte fails the remaining slots are filled without visiting them
    let mapped: [Expr; 32] = std::array::from_fn(|i| {
      if failed.is_none() {
        match self.expr(&bytes[i]) {
          Ok(e) => return e,
          Err(err) => failed = Some(err),
        }
      }
      Expr::LitByte(0)
    });
    match failed {
      Some(err) => Err(err),
      None => Ok(Expr::JoinBytes(Box::new(mapped))),
    }
  }

  fn partial(&mut self, props: &[Prop], traces: &Traces, exec: &PartialExec) -> MapResult<Expr, E> {
    let props = self.props(props)?;
    let traces = self.traces(traces)?;
    Ok(Expr::Partial(props, traces, self.partial_exec(exec)?))
  }

  fn failure(&mut self, props: &[Prop], traces: &Traces, err: &EvmError) -> MapResult<Expr, E> {
    let props = self.props(props)?;
    let traces = self.traces(traces)?;
    Ok(Expr::Failure(props, traces, self.evm_error(err)?))
  }

  fn success(
    &mut self,
    props: &[Prop],
    traces: &Traces,
    buf: &Expr,
    contracts: &BTreeMap<Expr, Expr>,
  ) -> MapResult<Expr, E> {
    let props = self.props(props)?;
    let traces = self.traces(traces)?;
    let buf = self.boxed(buf)?;
    let mut out = BTreeMap::new();
    for (addr, c) in contracts {
      let addr = self.expr(addr)?;
      out.insert(addr, self.expr(c)?);
    }
    Ok(Expr::Success(props, traces, buf, out))
  }

  fn log_entry(&mut self, addr: &Expr, data: &Expr, topics: &[Expr]) -> MapResult<Expr, E> {
    let addr = self.boxed(addr)?;
    let data = self.boxed(data)?;
    Ok(Expr::LogEntry(addr, data, self.exprs(topics)?))
  }

  fn contract_expr(
    &mut self,
    code: &ContractCode,
    storage: &Expr,
    balance: &Expr,
    nonce: Option<u64>,
  ) -> MapResult<Expr, E> {
    let code = self.code(code)?;
    let storage = self.boxed(storage)?;
    Ok(Expr::C { code, storage, balance: self.boxed(balance)?, nonce })
  }

  fn sstore(&mut self, addr: &Expr, slot: &Expr, val: &Expr, store: &Expr) -> MapResult<Expr, E> {
    let addr = self.boxed(addr)?;
    let slot = self.boxed(slot)?;
    let val = self.boxed(val)?;
    Ok(Expr::SStore(addr, slot, val, self.boxed(store)?))
  }

  fn copy_slice(&mut self, ops: [&Expr; 5]) -> MapResult<Expr, E> {
    let [src_off, dst_off, size, src, dst] = ops;
    let src_off = self.boxed(src_off)?;
    let dst_off = self.boxed(dst_off)?;
    let size = self.boxed(size)?;
    let src = self.boxed(src)?;
    Ok(Expr::CopySlice(src_off, dst_off, size, src, self.boxed(dst)?))
  }

  #[allow(clippy::too_many_arguments)]
  fn create(
    &mut self,
    value: &Expr,
    offset: &Expr,
    size: &Expr,
    memory: &Expr,
    logs: &[Expr],
    storage: &Expr,
    cont: &Expr,
  ) -> MapResult<Expr, E> {
    let value = self.boxed(value)?;
    let offset = self.boxed(offset)?;
    let size = self.boxed(size)?;
    let memory = self.boxed(memory)?;
    let logs = self.exprs(logs)?;
    let storage = self.boxed(storage)?;
    Ok(Expr::Create { value, offset, size, memory, logs, storage, cont: self.boxed(cont)? })
  }

  fn create2(&mut self, head: [&Expr; 5], logs: &[Expr], storage: &Expr, cont: &Expr) -> MapResult<Expr, E> {
    let [value, offset, size, salt, memory] = head;
    let value = self.boxed(value)?;
    let offset = self.boxed(offset)?;
    let size = self.boxed(size)?;
    let salt = self.boxed(salt)?;
    let memory = self.boxed(memory)?;
    let logs = self.exprs(logs)?;
    let storage = self.boxed(storage)?;
    Ok(Expr::Create2 { value, offset, size, salt, memory, logs, storage, cont: self.boxed(cont)? })
  }

  #[allow(clippy::too_many_arguments)]
  fn call(
    &mut self,
    call_code: bool,
    gas: &Expr,
    target: Option<&Expr>,
    value: &Expr,
    io: [&Expr; 3],
    logs: &[Expr],
    cont: &Expr,
  ) -> MapResult<Expr, E> {
    let [args, ret_offset, ret_size] = io;
    let gas = self.boxed(gas)?;
    let target = self.optional(target)?;
    let value = self.boxed(value)?;
    let args = self.boxed(args)?;
    let ret_offset = self.boxed(ret_offset)?;
    let ret_size = self.boxed(ret_size)?;
    let logs = self.exprs(logs)?;
    let cont = self.boxed(cont)?;
    Ok(if call_code {
      Expr::CallCode { gas, target, value, args, ret_offset, ret_size, logs, cont }
    } else {
      Expr::Call { gas, target, value, args, ret_offset, ret_size, logs, cont }
    })
  }

  fn delegate(
    &mut self,
    is_static: bool,
    gas: &Expr,
    target: Option<&Expr>,
    io: [&Expr; 3],
    logs: &[Expr],
    cont: &Expr,
  ) -> MapResult<Expr, E> {
    let [args, ret_offset, ret_size] = io;
    let gas = self.boxed(gas)?;
    let target = self.optional(target)?;
    let args = self.boxed(args)?;
    let ret_offset = self.boxed(ret_offset)?;
    let ret_size = self.boxed(ret_size)?;
    let logs = self.exprs(logs)?;
    let cont = self.boxed(cont)?;
    Ok(if is_static {
      Expr::StaticCall { gas, target, args, ret_offset, ret_size, logs, cont }
    } else {
      Expr::DelegateCall { gas, target, args, ret_offset, ret_size, logs, cont }
    })
  }

  // Adapters for the structures that embed expressions.

  fn props(&mut self, ps: &[Prop]) -> MapResult<Vec<Prop>, E> {
    let mut out = Vec::with_capacity(ps.len());
    for p in ps {
      out.push(self.prop(p)?);
    }
    Ok(out)
  }

  fn prop(&mut self, p: &Prop) -> MapResult<Prop, E> {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.prop_inner(p))
  }

  fn prop_inner(&mut self, p: &Prop) -> MapResult<Prop, E> {
    self.depth.enter::<E>()?;
    let out = match p {
      Prop::PEq(a, b) => Prop::PEq(self.expr(a)?, self.expr(b)?),
      Prop::PLT(a, b) => Prop::PLT(self.expr(a)?, self.expr(b)?),
      Prop::PGT(a, b) => Prop::PGT(self.expr(a)?, self.expr(b)?),
      Prop::PGEq(a, b) => Prop::PGEq(self.expr(a)?, self.expr(b)?),
      Prop::PLEq(a, b) => Prop::PLEq(self.expr(a)?, self.expr(b)?),
      Prop::PNeg(a) => Prop::PNeg(Box::new(self.prop(a)?)),
      Prop::PAnd(a, b) => Prop::PAnd(Box::new(self.prop(a)?), Box::new(self.prop(b)?)),
      Prop::POr(a, b) => Prop::POr(Box::new(self.prop(a)?), Box::new(self.prop(b)?)),
      Prop::PImpl(a, b) => Prop::PImpl(Box::new(self.prop(a)?), Box::new(self.prop(b)?)),
      Prop::PBool(b) => Prop::PBool(*b),
    };
    self.depth.leave();
    Ok(out)
  }

  fn code(&mut self, code: &ContractCode) -> MapResult<ContractCode, E> {
    Ok(match code {
      ContractCode::UnKnownCode(addr) => ContractCode::UnKnownCode(self.boxed(addr)?),
      ContractCode::InitCode(bytes, buf) => ContractCode::InitCode(bytes.clone(), self.boxed(buf)?),
      ContractCode::RuntimeCode(RuntimeCodeStruct::ConcreteRuntimeCode(bytes)) => {
        ContractCode::RuntimeCode(RuntimeCodeStruct::ConcreteRuntimeCode(bytes.clone()))
      }
      ContractCode::RuntimeCode(RuntimeCodeStruct::SymbolicRuntimeCode(ops)) => {
        ContractCode::RuntimeCode(RuntimeCodeStruct::SymbolicRuntimeCode(self.exprs(ops)?))
      }
    })
  }

  fn contract(&mut self, c: &Contract) -> MapResult<Contract, E> {
    let code = self.code(&c.code)?;
    let storage = self.expr(&c.storage)?;
    let orig_storage = self.expr(&c.orig_storage)?;
    let balance = self.expr(&c.balance)?;
    Ok(Contract { code, storage, orig_storage, balance, nonce: c.nonce, external: c.external })
  }

  fn contract_map(&mut self, m: &BTreeMap<Expr, Contract>) -> MapResult<BTreeMap<Expr, Contract>, E> {
    let mut out = BTreeMap::new();
    for (addr, c) in m {
      let addr = self.expr(addr)?;
      out.insert(addr, self.contract(c)?);
    }
    Ok(out)
  }

  fn traces(&mut self, t: &Traces) -> MapResult<Traces, E> {
    let mut traces = Vec::with_capacity(t.traces.len());
    for tree in &t.traces {
      traces.push(self.trace_tree(tree)?);
    }
    Ok(Traces { traces, contracts: self.contract_map(&t.contracts)? })
  }

  fn trace_tree(&mut self, tree: &Tree<Trace>) -> MapResult<Tree<Trace>, E> {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || self.trace_tree_inner(tree))
  }

  fn trace_tree_inner(&mut self, tree: &Tree<Trace>) -> MapResult<Tree<Trace>, E> {
    self.depth.enter::<E>()?;
    let value = self.trace(&tree.value)?;
    let mut children = Vec::with_capacity(tree.children.len());
    for child in &tree.children {
      children.push(self.trace_tree(child)?);
    }
    self.depth.leave();
    Ok(Tree { value, children })
  }

  fn trace(&mut self, t: &Trace) -> MapResult<Trace, E> {
    let contract = self.contract(&t.contract)?;
    let tracedata = match &t.tracedata {
      TraceData::EventTrace(addr, data, topics) => {
        let addr = self.expr(addr)?;
        let data = self.expr(data)?;
        TraceData::EventTrace(addr, data, self.exprs(topics)?)
      }
      TraceData::FrameTrace(ctx) => TraceData::FrameTrace(self.frame_context(ctx)?),
      TraceData::ErrorTrace(err) => TraceData::ErrorTrace(self.evm_error(err)?),
      TraceData::EntryTrace(msg) => TraceData::EntryTrace(msg.clone()),
      TraceData::ReturnTrace(buf, ctx) => {
        let buf = self.expr(buf)?;
        TraceData::ReturnTrace(buf, self.frame_context(ctx)?)
      }
    };
    Ok(Trace { op_ix: t.op_ix, contract, tracedata })
  }

  fn frame_context(&mut self, ctx: &FrameContext) -> MapResult<FrameContext, E> {
    Ok(match ctx {
      FrameContext::CreationContext { address, codehash, create_reversion, substate } => {
        FrameContext::CreationContext {
          address: self.expr(address)?,
          codehash: self.expr(codehash)?,
          create_reversion: self.contract_map(create_reversion)?,
          substate: self.substate(substate)?,
        }
      }
      FrameContext::CallContext {
        target,
        context,
        offset,
        size,
        codehash,
        abi,
        calldata,
        call_reversion,
        substate,
      } => FrameContext::CallContext {
        target: self.expr(target)?,
        context: self.expr(context)?,
        offset: *offset,
        size: *size,
        codehash: self.expr(codehash)?,
        abi: *abi,
        calldata: self.expr(calldata)?,
        call_reversion: self.contract_map(call_reversion)?,
        substate: self.substate(substate)?,
      },
    })
  }

  fn substate(&mut self, s: &SubState) -> MapResult<SubState, E> {
    let selfdestructs = self.exprs(&s.selfdestructs)?;
    let touched_accounts = self.exprs(&s.touched_accounts)?;
    let accessed_addresses = self.exprs(&s.accessed_addresses)?.into_iter().collect();
    let mut accessed_storage_keys = BTreeSet::new();
    for (addr, slot) in &s.accessed_storage_keys {
      accessed_storage_keys.insert((self.expr(addr)?, *slot));
    }
    let mut refunds = Vec::with_capacity(s.refunds.len());
    for (addr, amount) in &s.refunds {
      refunds.push((self.expr(addr)?, *amount));
    }
    Ok(SubState { selfdestructs, touched_accounts, accessed_addresses, accessed_storage_keys, refunds })
  }

  fn evm_error(&mut self, err: &EvmError) -> MapResult<EvmError, E> {
    Ok(match err {
      EvmError::BalanceTooLow(a, b) => {
        let a = self.boxed(a)?;
        EvmError::BalanceTooLow(a, self.boxed(b)?)
      }
      EvmError::Revert(buf) => EvmError::Revert(self.boxed(buf)?),
      EvmError::MaxInitCodeSizeExceeded(max, size) => EvmError::MaxInitCodeSizeExceeded(*max, self.boxed(size)?),
      EvmError::UnrecognizedOpcode(_)
      | EvmError::SelfDestruction
      | EvmError::StackUnderrun
      | EvmError::BadJumpDestination
      | EvmError::OutOfGas(..)
      | EvmError::StackLimitExceeded
      | EvmError::IllegalOverflow
      | EvmError::StateChangeWhileStatic
      | EvmError::InvalidMemoryAccess
      | EvmError::CallDepthLimitReached
      | EvmError::MaxCodeSizeExceeded(..)
      | EvmError::InvalidFormat
      | EvmError::PrecompileFailure
      | EvmError::ReturnDataOutOfBounds
      | EvmError::NonceOverflow
      | EvmError::BadCheatCode(_)
      | EvmError::NonexistentFork(_) => err.clone(),
    })
  }

  fn partial_exec(&mut self, exec: &PartialExec) -> MapResult<PartialExec, E> {
    Ok(match exec {
      PartialExec::UnexpectedSymbolicArg { pc, msg, args } => {
        PartialExec::UnexpectedSymbolicArg { pc: *pc, msg: msg.clone(), args: self.exprs(args)? }
      }
      PartialExec::MaxIterationsReached { pc, addr } => {
        PartialExec::MaxIterationsReached { pc: *pc, addr: self.boxed(addr)? }
      }
      PartialExec::JumpIntoSymbolicCode { pc, jump_dst } => {
        PartialExec::JumpIntoSymbolicCode { pc: *pc, jump_dst: *jump_dst }
      }
    })
  }
}

// Generic terms ----------------------------------------------------------------------------------

/// Anything the engine can fold over or rewrite: expressions and every structure embedding them.
pub trait TraversableTerm: Sized {
  /// Pre-order fold under an explicit configuration.
  fn try_fold_term<B, F>(&self, config: &TraversalConfig, f: &mut F, acc: B) -> Result<B, TraversalError>
  where
    B: Monoid,
    F: FnMut(&Expr) -> B;

  /// Bottom-up effectful rewrite under an explicit configuration.
  fn try_map_term_m<E, F>(&self, config: &TraversalConfig, f: &mut F) -> Result<Self, TraversalError<E>>
  where
    F: FnMut(Expr) -> Result<Expr, E>;

  /// # Panics
  ///
  /// When nesting exceeds the default depth limit.
  fn fold_term<B, F>(&self, f: &mut F, acc: B) -> B
  where
    B: Monoid,
    F: FnMut(&Expr) -> B,
  {
    within_bounds(self.try_fold_term(&TraversalConfig::default(), f, acc))
  }

  /// # Panics
  ///
  /// When nesting exceeds the default depth limit, or when `f` changes the kind of a node.
  fn map_term<F>(&self, mut f: F) -> Self
  where
    F: FnMut(Expr) -> Expr,
  {
    within_bounds(self.try_map_term_m(&TraversalConfig::default(), &mut |e: Expr| Ok::<_, Infallible>(f(e))))
  }

  fn map_term_m<E, F>(&self, f: &mut F) -> Result<Self, TraversalError<E>>
  where
    F: FnMut(Expr) -> Result<Expr, E>,
  {
    self.try_map_term_m(&TraversalConfig::default(), f)
  }
}

macro_rules! traversable {
  ($t:ty, $method:ident) => {
    impl TraversableTerm for $t {
      fn try_fold_term<B, F>(&self, config: &TraversalConfig, f: &mut F, acc: B) -> Result<B, TraversalError>
      where
        B: Monoid,
        F: FnMut(&Expr) -> B,
      {
        Folder::new(config, f).$method(acc, self)
      }

      fn try_map_term_m<E, F>(&self, config: &TraversalConfig, f: &mut F) -> Result<Self, TraversalError<E>>
      where
        F: FnMut(Expr) -> Result<Expr, E>,
      {
        Mapper::new(config, f).$method(self)
      }
    }
  };
}

traversable!(Expr, expr);
traversable!(Prop, prop);
traversable!(Contract, contract);
traversable!(ContractCode, code);
traversable!(Traces, traces);
traversable!(SubState, substate);

// Entry points -----------------------------------------------------------------------------------

pub fn fold_expr<B, F>(f: &mut F, acc: B, expr: &Expr) -> B
where
  B: Monoid,
  F: FnMut(&Expr) -> B,
{
  expr.fold_term(f, acc)
}

pub fn try_fold_expr<B, F>(config: &TraversalConfig, f: &mut F, acc: B, expr: &Expr) -> Result<B, TraversalError>
where
  B: Monoid,
  F: FnMut(&Expr) -> B,
{
  expr.try_fold_term(config, f, acc)
}

pub fn fold_prop<B, F>(f: &mut F, acc: B, p: &Prop) -> B
where
  B: Monoid,
  F: FnMut(&Expr) -> B,
{
  p.fold_term(f, acc)
}

pub fn fold_contract<B, F>(f: &mut F, acc: B, c: &Contract) -> B
where
  B: Monoid,
  F: FnMut(&Expr) -> B,
{
  c.fold_term(f, acc)
}

pub fn fold_code<B, F>(f: &mut F, acc: B, code: &ContractCode) -> B
where
  B: Monoid,
  F: FnMut(&Expr) -> B,
{
  code.fold_term(f, acc)
}

pub fn fold_traces<B, F>(f: &mut F, acc: B, traces: &Traces) -> B
where
  B: Monoid,
  F: FnMut(&Expr) -> B,
{
  traces.fold_term(f, acc)
}

pub fn fold_substate<B, F>(f: &mut F, acc: B, s: &SubState) -> B
where
  B: Monoid,
  F: FnMut(&Expr) -> B,
{
  s.fold_term(f, acc)
}

pub fn map_expr<F>(f: F, expr: &Expr) -> Expr
where
  F: FnMut(Expr) -> Expr,
{
  expr.map_term(f)
}

pub fn map_expr_m<E, F>(f: &mut F, expr: &Expr) -> Result<Expr, TraversalError<E>>
where
  F: FnMut(Expr) -> Result<Expr, E>,
{
  expr.map_term_m(f)
}

pub fn map_expr_m_with<E, F>(config: &TraversalConfig, f: &mut F, expr: &Expr) -> Result<Expr, TraversalError<E>>
where
  F: FnMut(Expr) -> Result<Expr, E>,
{
  expr.try_map_term_m(config, f)
}

pub fn map_prop<F>(f: F, p: &Prop) -> Prop
where
  F: FnMut(Expr) -> Expr,
{
  p.map_term(f)
}

pub fn map_prop_m<E, F>(f: &mut F, p: &Prop) -> Result<Prop, TraversalError<E>>
where
  F: FnMut(Expr) -> Result<Expr, E>,
{
  p.map_term_m(f)
}

pub fn map_contract<F>(f: F, c: &Contract) -> Contract
where
  F: FnMut(Expr) -> Expr,
{
  c.map_term(f)
}

pub fn map_contract_m<E, F>(f: &mut F, c: &Contract) -> Result<Contract, TraversalError<E>>
where
  F: FnMut(Expr) -> Result<Expr, E>,
{
  c.map_term_m(f)
}

pub fn map_traces_m<E, F>(f: &mut F, traces: &Traces) -> Result<Traces, TraversalError<E>>
where
  F: FnMut(Expr) -> Result<Expr, E>,
{
  traces.map_term_m(f)
}

pub fn map_substate_m<E, F>(f: &mut F, s: &SubState) -> Result<SubState, TraversalError<E>>
where
  F: FnMut(Expr) -> Result<Expr, E>,
{
  s.map_term_m(f)
}
