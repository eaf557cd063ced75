// Module: rhoexpr::keccak
// Description: Keccak discovery, concretisation and the assumptions handed to the solver

use std::collections::BTreeSet;

use log::debug;
use sha2::{Digest, Sha256};
use tiny_keccak::{Hasher, Keccak};

use crate::modules::traversals::TraversableTerm;
use crate::modules::types::{Expr, Prop, W256};

pub fn keccak_bytes(input: &[u8]) -> [u8; 32] {
  let mut hasher = Keccak::v256();
  let mut output = [0u8; 32];
  hasher.update(input);
  hasher.finalize(&mut output);
  output
}

pub fn keccak_w256(input: &[u8]) -> W256 {
  W256::from_bytes(&keccak_bytes(input))
}

pub fn sha256_bytes(input: &[u8]) -> [u8; 32] {
  let mut output = [0u8; 32];
  output.copy_from_slice(&Sha256::digest(input));
  output
}

// Discovery --------------------------------------------------------------------------------------

fn keccak_finder(e: &Expr) -> BTreeSet<Expr> {
  match e {
    Expr::Keccak(_) => BTreeSet::from([e.clone()]),
    _ => BTreeSet::new(),
  }
}

/// Every distinct `Keccak` node inside `t`.
pub fn find_keccak_exprs<T: TraversableTerm>(t: &T) -> BTreeSet<Expr> {
  t.fold_term(&mut keccak_finder, BTreeSet::new())
}

fn find_keccak_props_exprs(ps: &[Prop], bufs: &[Expr], stores: &[Expr]) -> BTreeSet<Expr> {
  let mut found = BTreeSet::new();
  for p in ps {
    found.append(&mut find_keccak_exprs(p));
  }
  for e in bufs.iter().chain(stores) {
    found.append(&mut find_keccak_exprs(e));
  }
  found
}

// Concretisation ---------------------------------------------------------------------------------

fn conc_hash(e: Expr) -> Expr {
  match e {
    Expr::Keccak(ref buf) => match &**buf {
      Expr::ConcreteBuf(bs) => Expr::Lit(keccak_w256(bs)),
      _ => e,
    },
    Expr::SHA256(ref buf) => match &**buf {
      Expr::ConcreteBuf(bs) => Expr::Lit(W256::from_bytes(&sha256_bytes(bs))),
      _ => e,
    },
    _ => e,
  }
}

/// Replaces hashes of concrete buffers with their value.
pub fn conc_keccak_simp_expr(e: &Expr) -> Expr {
  e.map_term(conc_hash)
}

pub fn conc_keccak_props(ps: &[Prop]) -> Vec<Prop> {
  ps.iter().map(|p| p.map_term(conc_hash)).collect()
}

// Assumptions ------------------------------------------------------------------------------------

fn combine<T: Clone>(lst: &[T]) -> Vec<(T, T)> {
  let mut result = Vec::new();
  for (i, x) in lst.iter().enumerate() {
    for y in &lst[i + 1..] {
      result.push((x.clone(), y.clone()));
    }
  }
  result
}

fn lit(n: u64) -> Expr {
  Expr::Lit(W256::from(n))
}

// Hashes of distinct inputs differ.
fn inj_prop(k1: &Expr, b1: &Expr, k2: &Expr, b2: &Expr) -> Prop {
  Prop::POr(
    Box::new(Prop::PAnd(
      Box::new(Prop::PEq(b1.clone(), b2.clone())),
      Box::new(Prop::PEq(Expr::BufLength(Box::new(b1.clone())), Expr::BufLength(Box::new(b2.clone())))),
    )),
    Box::new(Prop::PNeg(Box::new(Prop::PEq(k1.clone(), k2.clone())))),
  )
}

fn conc_val(k: &Expr, buf: &Expr) -> Prop {
  match buf {
    Expr::ConcreteBuf(bs) => Prop::PEq(Expr::Lit(keccak_w256(bs)), k.clone()),
    _ => Prop::PBool(true),
  }
}

fn min_prop(k: &Expr) -> Prop {
  Prop::PGT(k.clone(), lit(256))
}

fn min_distance(ka: &Expr, a: &Expr, kb: &Expr, b: &Expr) -> Prop {
  Prop::PImpl(
    Box::new(Prop::PNeg(Box::new(Prop::PEq(a.clone(), b.clone())))),
    Box::new(Prop::PAnd(
      Box::new(Prop::PGEq(Expr::Sub(Box::new(ka.clone()), Box::new(kb.clone())), lit(256))),
      Box::new(Prop::PGEq(Expr::Sub(Box::new(kb.clone()), Box::new(ka.clone())), lit(256))),
    )),
  )
}

/// Facts about every keccak in the query: injectivity, known values of concrete inputs, a lower
/// bound on each hash, and a minimum distance between hashes of distinct inputs.
pub fn keccak_assumptions(ps: &[Prop], bufs: &[Expr], stores: &[Expr]) -> Vec<Prop> {
  // (hash node, hashed buffer) pairs in ascending node order
  let hashes: Vec<(Expr, Expr)> = find_keccak_props_exprs(ps, bufs, stores)
    .into_iter()
    .filter_map(|k| match &k {
      Expr::Keccak(buf) => {
        let buf = (**buf).clone();
        Some((k, buf))
      }
      _ => None,
    })
    .collect();

  let injectivity = combine(&hashes).into_iter().map(|((k1, b1), (k2, b2))| inj_prop(&k1, &b1, &k2, &b2));
  let conc_values = hashes.iter().map(|(k, b)| conc_val(k, b));
  let min_value = hashes.iter().map(|(k, _)| min_prop(k));
  let min_diff_of_pairs = hashes.iter().flat_map(|(ka, a)| {
    hashes.iter().filter(move |(kb, _)| kb != ka).map(move |(kb, b)| min_distance(ka, a, kb, b))
  });

  let out: Vec<Prop> = injectivity.chain(conc_values).chain(min_value).chain(min_diff_of_pairs).collect();
  debug!("{} keccak assumptions over {} hashes", out.len(), hashes.len());
  out
}

fn compute(e: &Expr) -> Vec<Prop> {
  match e {
    Expr::Keccak(buf) => match &**buf {
      Expr::ConcreteBuf(bs) => vec![Prop::PEq(e.clone(), Expr::Lit(keccak_w256(bs)))],
      _ => vec![],
    },
    _ => vec![],
  }
}

/// Value equations for every keccak whose input is concrete.
pub fn keccak_compute(ps: &[Prop], bufs: &[Expr], stores: &[Expr]) -> Vec<Prop> {
  let mut result = Vec::new();
  for p in ps {
    result.extend(p.fold_term(&mut compute, Vec::new()));
  }
  for e in bufs.iter().chain(stores) {
    result.extend(e.fold_term(&mut compute, Vec::new()));
  }
  result
}
