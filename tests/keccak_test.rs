mod common;

use std::collections::BTreeSet;

use common::*;
use rhoexpr::modules::keccak::{
  conc_keccak_props, conc_keccak_simp_expr, find_keccak_exprs, keccak_assumptions, keccak_bytes, keccak_compute,
  keccak_w256, sha256_bytes,
};
use rhoexpr::modules::types::{Expr, Prop, W256};

#[test]
fn test_hashes_of_empty_input() {
  assert_eq!(hex::encode(keccak_bytes(&[])), "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470");
  assert_eq!(keccak_w256(&[]).to_hex(), "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470");
  assert_eq!(hex::encode(sha256_bytes(&[])), "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855");
}

#[test]
fn test_conc_keccak_simp_expr() {
  let e = Expr::Add(b(Expr::Keccak(b(cbuf(&[])))), b(Expr::Keccak(b(abuf("x")))));
  assert_eq!(
    conc_keccak_simp_expr(&e),
    Expr::Add(b(Expr::Lit(keccak_w256(&[]))), b(Expr::Keccak(b(abuf("x")))))
  );

  let sha = Expr::SHA256(b(cbuf(&[])));
  assert_eq!(conc_keccak_simp_expr(&sha), Expr::Lit(W256::from_bytes(&sha256_bytes(&[]))));
}

#[test]
fn test_conc_keccak_props() {
  let ps = vec![Prop::PEq(Expr::Keccak(b(cbuf(&[1]))), var("h")), Prop::PBool(false)];
  assert_eq!(
    conc_keccak_props(&ps),
    vec![Prop::PEq(Expr::Lit(keccak_w256(&[1])), var("h")), Prop::PBool(false)]
  );
}

#[test]
fn test_find_keccak_exprs_in_nested_hashes() {
  let inner = Expr::Keccak(b(abuf("a")));
  let outer = Expr::Keccak(b(Expr::WriteWord(b(lit(0)), b(inner.clone()), b(cbuf(&[])))));
  let p = Prop::PLT(outer.clone(), inner.clone());
  assert_eq!(find_keccak_exprs(&p), BTreeSet::from([inner, outer]));
}

#[test]
fn test_keccak_assumptions_for_two_hashes() {
  init_logger();
  let ka = Expr::Keccak(b(abuf("a")));
  let kb = Expr::Keccak(b(abuf("b")));
  let ps = vec![Prop::PEq(ka.clone(), kb.clone())];
  let out = keccak_assumptions(&ps, &[], &[]);
  // one injectivity fact, two concrete values, two lower bounds, two distances
  assert_eq!(out.len(), 7);
  assert!(out.contains(&Prop::PGT(ka.clone(), lit(256))));
  assert!(out.contains(&Prop::PGT(kb.clone(), lit(256))));
  assert_eq!(out.iter().filter(|p| **p == Prop::PBool(true)).count(), 2);
  assert!(matches!(out[0], Prop::POr(..)));
}

#[test]
fn test_keccak_assumptions_pin_concrete_values() {
  let k = Expr::Keccak(b(cbuf(&[1, 2])));
  let out = keccak_assumptions(&[], &[Expr::WriteWord(b(lit(0)), b(k.clone()), b(abuf("m")))], &[]);
  assert_eq!(out, vec![Prop::PEq(Expr::Lit(keccak_w256(&[1, 2])), k.clone()), Prop::PGT(k, lit(256))]);
}

#[test]
fn test_keccak_compute() {
  let conc = Expr::Keccak(b(cbuf(&[7])));
  let sym_hash = Expr::Keccak(b(abuf("x")));
  let ps = vec![Prop::PEq(conc.clone(), sym_hash)];
  let store = Expr::SStore(b(sym("s")), b(conc.clone()), b(lit(1)), b(Expr::AbstractStore(b(sym("s")), None)));
  let out = keccak_compute(&ps, &[], &[store]);
  let expected = Prop::PEq(conc, Expr::Lit(keccak_w256(&[7])));
  assert_eq!(out, vec![expected.clone(), expected]);
}
