mod common;

use std::collections::BTreeSet;

use common::*;
use rhoexpr::modules::etypes::EType;
use rhoexpr::modules::format::FormatError;
use rhoexpr::modules::types::{Addr, Expr, GVar, W256};

#[test]
fn test_w256_format() {
  let x = W256(12, 3);
  assert_eq!("30000000000000000000000000000000c", x.to_hex());
  assert_eq!("1020847100762815390390123822295304634380", x.to_decimal());
  assert_eq!(W256::ZERO.to_hex(), "0");
  assert!(W256::ZERO.is_zero() && !W256(0, 1).is_zero());
}

#[test]
fn test_w256_from_bytes() {
  // shorter than 32 bytes
  assert_eq!(W256::from_bytes(&[1, 2, 3]), W256(0x010203, 0));

  // exactly 32 bytes
  let expected = u128::from_be_bytes([1; 16]);
  assert_eq!(W256::from_bytes(&[1; 32]), W256(expected, expected));

  // longer inputs keep their last 32 bytes
  let mut long = vec![0xff];
  long.extend([0u8; 31]);
  long.push(7);
  assert_eq!(W256::from_bytes(&long), W256::from(7u64));

  let w = W256(0xdead, 0xbeef);
  assert_eq!(W256::from_bytes(&w.to_bytes()), w);
}

#[test]
fn test_w256_wraps() {
  let one = W256::from(1u64);
  assert_eq!(W256::MAX + one, W256::ZERO);
  assert_eq!(W256::ZERO - one, W256::MAX);
  assert_eq!(W256::MAX * W256::from(2u64), W256::MAX - one);
  assert_eq!(W256::from(6u64) * W256::from(7u64), W256::from(42u64));
}

#[test]
fn test_w256_order_is_numeric() {
  assert!(W256(0, 1) > W256(u128::MAX, 0));
  assert!(W256::from(2u64) < W256::from(3u64));
}

#[test]
fn test_addr_from_hex() {
  assert_eq!(Addr::from_hex("0x01"), Ok(Addr::from(1u64)));
  assert_eq!(Addr::from_hex("abc").map(|a| a.to_w256()), Ok(W256::from(0xabcu64)));
  assert_eq!(Addr::from_hex(&"11".repeat(21)), Err(FormatError::TooLong { what: "address", max: 20, found: 21 }));
  assert!(matches!(Addr::from_hex("0xnothex"), Err(FormatError::InvalidHex { .. })));
  assert_eq!(Addr::from_w256(W256::MAX), Addr([0xff; 20]));
  assert_eq!(Addr::from(1u64).to_string(), format!("0x{}01", "00".repeat(19)));
}

#[test]
fn test_display() {
  assert_eq!(GVar::buf(0).to_string(), "BufVar(0)");
  assert_eq!(GVar::store(2).to_string(), "StoreVar(2)");
  assert_eq!(GVar::new(EType::Word, 1).to_string(), "EWordVar(1)");
  assert_eq!(Expr::Add(b(var("x")), b(lit(255))).to_string(), "Add(Var(x), Lit(0xff))");
  assert_eq!(Expr::GVar(GVar::buf(4)).to_string(), "GVar(BufVar(4))");
  assert_eq!(Expr::LitByte(1).to_string(), "LitByte(0x01)");
  assert_eq!(cbuf(&[0xde, 0xad]).to_string(), "ConcreteBuf(0xdead)");
}

#[test]
fn test_kinds() {
  let expected = [
    (lit(1), EType::Word),
    (Expr::LitByte(1), EType::Byte),
    (Expr::IndexWord(b(lit(0)), b(lit(1))), EType::Byte),
    (Expr::Gas(0, 1), EType::Word),
    (Expr::WAddr(b(lit(1))), EType::Addr),
    (Expr::AbstractStore(b(sym("a")), None), EType::Storage),
    (Expr::BufLength(b(abuf("m"))), EType::Word),
    (Expr::CopySlice(b(lit(0)), b(lit(0)), b(lit(1)), b(abuf("a")), b(abuf("b"))), EType::Buf),
    (log(), EType::Log),
    (end(), EType::End),
    (Expr::GVar(GVar::store(0)), EType::Storage),
  ];
  for (e, kind) in expected {
    assert_eq!(e.kind(), kind, "{}", e);
  }
  let nodes = every_node();
  let distinct: BTreeSet<&str> = nodes.iter().map(|e| e.tag()).collect();
  assert_eq!(distinct.len(), nodes.len());
}

#[test]
fn test_etype_names() {
  assert_eq!(EType::Word.to_string(), "EWord");
  assert_eq!(EType::Addr.to_string(), "EAddr");
  assert_eq!(EType::Contract.to_string(), "EContract");
  assert_eq!(EType::Buf.to_string(), "Buf");
}
