mod common;

use std::collections::{BTreeMap, BTreeSet};

use common::*;
use rhoexpr::modules::config::TraversalConfig;
use rhoexpr::modules::contract::unknown_contract;
use rhoexpr::modules::etypes::EType;
use rhoexpr::modules::expr::referenced_vars;
use rhoexpr::modules::traversals::{
  map_contract, map_contract_m, map_expr, map_expr_m, map_expr_m_with, map_prop, map_prop_m, map_substate_m,
  map_traces_m, TraversableTerm, TraversalError,
};
use rhoexpr::modules::types::{Expr, GVar, Prop, SubState, Traces, W256};

fn add_mul() -> Expr {
  Expr::Add(b(lit(1)), b(Expr::Mul(b(lit(2)), b(lit(3)))))
}

fn scale(e: Expr) -> Expr {
  match e {
    Expr::Lit(w) => Expr::Lit(w * W256::from(10u64)),
    e => e,
  }
}

fn bump(e: Expr) -> Expr {
  match e {
    Expr::Lit(w) => Expr::Lit(w + W256::from(1u64)),
    Expr::LitByte(v) => Expr::LitByte(v.wrapping_add(1)),
    e => e,
  }
}

fn rename_x(e: Expr) -> Expr {
  match e {
    Expr::Var(ref v) if v == "x" => var("renamed"),
    e => e,
  }
}

#[test]
fn test_map_scales_literals() {
  let expected = Expr::Add(b(lit(10)), b(Expr::Mul(b(lit(20)), b(lit(30)))));
  assert_eq!(map_expr(scale, &add_mul()), expected);
}

#[test]
fn test_map_identity_returns_equal_tree() {
  init_logger();
  for node in every_node() {
    assert_eq!(map_expr(|e| e, &node), node, "identity changed {}", node.tag());
  }
  let p = Prop::PImpl(Box::new(Prop::PBool(true)), Box::new(Prop::PNeg(Box::new(Prop::PGT(var("a"), lit(0))))));
  assert_eq!(map_prop(|e| e, &p), p);
  let c = sample_contract(sym("me"));
  assert_eq!(map_contract(|e| e, &c), c);
  let t = sample_traces();
  assert_eq!(t.map_term(|e| e), t);
  let s = sample_substate();
  assert_eq!(s.map_term(|e| e), s);
}

#[test]
fn test_map_is_bottom_up() {
  let mut seen = Vec::new();
  map_expr(
    |e| {
      seen.push(e.tag());
      e
    },
    &add_mul(),
  );
  assert_eq!(seen, vec!["Lit", "Lit", "Lit", "Mul", "Add"]);
}

#[test]
fn test_map_visits_rebuilt_node() {
  // constant folding only works if operands are already folded when the parent is visited
  let fold_consts = |e: Expr| match e {
    Expr::Add(ref a, ref b) => match (&**a, &**b) {
      (Expr::Lit(x), Expr::Lit(y)) => Expr::Lit(*x + *y),
      _ => e,
    },
    Expr::Mul(ref a, ref b) => match (&**a, &**b) {
      (Expr::Lit(x), Expr::Lit(y)) => Expr::Lit(*x * *y),
      _ => e,
    },
    e => e,
  };
  assert_eq!(map_expr(fold_consts, &add_mul()), lit(7));
}

#[test]
fn test_map_composition() {
  let swap_sub = |e: Expr| match e {
    Expr::Sub(a, b) => Expr::Add(a, b),
    e => e,
  };
  for node in every_node() {
    let twice = map_expr(scale, &map_expr(swap_sub, &node));
    let once = map_expr(|e| scale(swap_sub(e)), &node);
    assert_eq!(twice, once, "composition differs on {}", node.tag());
  }
}

#[test]
fn test_map_preserves_arity() {
  for node in every_node() {
    let mapped = map_expr(bump, &node);
    assert_eq!(tags(&mapped), tags(&node), "shape of {} changed", node.tag());
    assert_eq!(mapped.typed_operands().len(), node.typed_operands().len());
    match (&node, &mapped) {
      (Expr::JoinBytes(before), Expr::JoinBytes(after)) => {
        assert_eq!(after.len(), 32);
        assert_eq!(before[31], Expr::LitByte(31));
        assert_eq!(after[31], Expr::LitByte(32));
      }
      (Expr::Call { target: t0, logs: l0, .. }, Expr::Call { target: t1, logs: l1, .. })
      | (Expr::CallCode { target: t0, logs: l0, .. }, Expr::CallCode { target: t1, logs: l1, .. })
      | (Expr::DelegateCall { target: t0, logs: l0, .. }, Expr::DelegateCall { target: t1, logs: l1, .. })
      | (Expr::StaticCall { target: t0, logs: l0, .. }, Expr::StaticCall { target: t1, logs: l1, .. }) => {
        assert_eq!(t0.is_some(), t1.is_some());
        assert_eq!(l0.len(), l1.len());
      }
      _ => {}
    }
  }
}

#[test]
fn test_join_bytes_stops_at_failing_byte() {
  let join = Expr::JoinBytes(Box::new(std::array::from_fn(|i| Expr::LitByte(i as u8))));
  let mut seen = Vec::new();
  let out = map_expr_m(
    &mut |e: Expr| {
      seen.push(e.clone());
      match e {
        Expr::LitByte(5) => Err(5u8),
        e => Ok(e),
      }
    },
    &join,
  );
  assert_eq!(out, Err(TraversalError::Visitor(5)));
  assert_eq!(seen, (0..6u8).map(Expr::LitByte).collect::<Vec<_>>());
}

#[test]
fn test_map_rewrites_literals_everywhere() {
  for node in every_node() {
    let mapped = map_expr(bump, &node);
    let lits = |e: &Expr| {
      e.fold_term(
        &mut |n: &Expr| match n {
          Expr::Lit(w) => vec![*w],
          _ => vec![],
        },
        Vec::new(),
      )
    };
    let expected: Vec<W256> = lits(&node).into_iter().map(|w| w + W256::from(1u64)).collect();
    assert_eq!(lits(&mapped), expected, "{}", node.tag());
  }
}

#[test]
fn test_map_reaches_embedded_expressions() {
  for node in every_node() {
    let mapped = map_expr(rename_x, &node);
    assert!(!referenced_vars(&mapped).contains("x"), "{} kept x", node.tag());
  }
  let renamed = map_prop(rename_x, &Prop::PNeg(Box::new(Prop::PEq(var("x"), lit(0)))));
  assert_eq!(renamed, Prop::PNeg(Box::new(Prop::PEq(var("renamed"), lit(0)))));
}

#[test]
fn test_map_rewrites_inside_address_wrapper() {
  let wrapped = Expr::WAddr(b(Expr::Add(b(var("x")), b(lit(1)))));
  let mut seen = Vec::new();
  let mapped = map_expr(
    |e| {
      seen.push(e.tag());
      rename_x(e)
    },
    &wrapped,
  );
  assert_eq!(seen, vec!["Var", "Lit", "Add", "WAddr"]);
  assert_eq!(mapped, Expr::WAddr(b(Expr::Add(b(var("renamed")), b(lit(1))))));
}

#[test]
fn test_placeholder_map_visits_once() {
  let g = Expr::GVar(GVar::store(2));
  let mut calls = 0;
  let out = map_expr(
    |e| {
      calls += 1;
      e
    },
    &g,
  );
  assert_eq!(calls, 1);
  assert_eq!(out, g);
}

#[test]
fn test_effectful_identity_matches_pure() {
  for node in every_node() {
    let pure = map_expr(bump, &node);
    let effectful = map_expr_m(&mut |e: Expr| Ok::<_, String>(bump(e)), &node);
    assert_eq!(effectful, Ok(pure));
  }
}

#[test]
fn test_effectful_map_aborts_on_first_failure() {
  let mut seen = Vec::new();
  let out = map_expr_m(
    &mut |e: Expr| {
      seen.push(e.to_string());
      match e {
        Expr::Lit(w) if w == W256::from(2u64) => Err("two".to_string()),
        e => Ok(e),
      }
    },
    &add_mul(),
  );
  assert_eq!(out, Err(TraversalError::Visitor("two".to_string())));
  // Lit 3, Mul and Add are never visited
  assert_eq!(seen, vec!["Lit(0x1)", "Lit(0x2)"]);
}

#[test]
fn test_option_like_effect() {
  let concrete_only = |e: Expr| match e {
    Expr::Var(_) => Err(()),
    e => Ok(e),
  };
  assert_eq!(map_expr_m(&mut { concrete_only }, &add_mul()), Ok(add_mul()));
  let symbolic = Expr::Add(b(lit(1)), b(var("x")));
  let out = map_expr_m(&mut { concrete_only }, &symbolic);
  assert_eq!(out.map_err(TraversalError::into_visitor), Err(Some(())));
}

#[test]
fn test_state_effect_numbers_nodes() {
  let mut next = 0u64;
  let numbered = map_expr_m(
    &mut |e: Expr| {
      let out = match e {
        Expr::Lit(_) => lit(next),
        e => e,
      };
      next += 1;
      Ok::<_, ()>(out)
    },
    &add_mul(),
  );
  // children are numbered before parents
  assert_eq!(numbered, Ok(Expr::Add(b(lit(0)), b(Expr::Mul(b(lit(1)), b(lit(2)))))));
  assert_eq!(next, 5);
}

#[test]
fn test_map_rejects_kind_change() {
  let to_addr = |e: Expr| match e {
    Expr::Lit(_) => Ok::<_, ()>(sym("oops")),
    e => Ok(e),
  };
  let out = map_expr_m(&mut { to_addr }, &add_mul());
  assert_eq!(out, Err(TraversalError::KindChanged { node: "Lit", expected: EType::Word, found: EType::Addr }));

  let unchecked = TraversalConfig::default().with_kind_checks(false);
  let out = map_expr_m_with(&unchecked, &mut { to_addr }, &lit(1));
  assert_eq!(out, Ok(sym("oops")));
}

#[test]
#[should_panic(expected = "changed its kind from EWord to EAddr")]
fn test_pure_map_panics_on_kind_change() {
  map_expr(|_| sym("oops"), &lit(1));
}

#[test]
fn test_map_depth_limit() {
  init_logger();
  let config = TraversalConfig::default().with_max_depth(3);
  let out = map_expr_m_with(&config, &mut |e: Expr| Ok::<_, ()>(e), &not_chain(4));
  assert_eq!(out, Err(TraversalError::DepthExceeded { limit: 3 }));
  let out = map_expr_m_with(&config, &mut |e: Expr| Ok::<_, ()>(e), &not_chain(2));
  assert_eq!(out, Ok(not_chain(2)));
}

#[test]
fn test_map_deep_chain_on_default_thread() {
  let deep = not_chain(1000);
  assert_eq!(map_expr(scale, &deep), (0..1000).fold(lit(10), |e, _| Expr::Not(b(e))));
}

#[test]
fn test_map_past_default_limit_is_an_error() {
  let config = TraversalConfig::default();
  let limit = config.max_depth;
  let mut keep = |e: Expr| Ok::<_, ()>(e);
  assert_eq!(map_expr_m_with(&config, &mut keep, &not_chain(limit - 1)), Ok(not_chain(limit - 1)));
  assert_eq!(map_expr_m_with(&config, &mut keep, &not_chain(limit)), Err(TraversalError::DepthExceeded { limit }));
  assert_eq!(map_expr_m_with(&config, &mut keep, &not_chain(2000)), Err(TraversalError::DepthExceeded { limit }));
}

#[test]
fn test_map_deep_buffer_writes() {
  let writes_of = |step: u64| {
    (0..1500u64).fold(abuf("m"), |buf, i| Expr::WriteWord(b(lit(i * step)), b(var("v")), b(buf)))
  };
  let writes = writes_of(1);
  let config = TraversalConfig::default().with_max_depth(2000);
  let out = map_expr_m_with(&config, &mut |e: Expr| Ok::<_, ()>(scale(e)), &writes);
  assert_eq!(out, Ok(writes_of(10)));
  let out = map_expr_m_with(&TraversalConfig::default(), &mut |e: Expr| Ok::<_, ()>(e), &writes);
  assert_eq!(out, Err(TraversalError::DepthExceeded { limit: 1024 }));
}

#[test]
fn test_map_merges_colliding_accessed_addresses() {
  let s = SubState {
    accessed_addresses: BTreeSet::from([sym("a"), sym("b"), sym("c")]),
    accessed_storage_keys: BTreeSet::from([(sym("a"), W256::from(1u64)), (sym("b"), W256::from(1u64))]),
    ..SubState::default()
  };
  let same = |e: Expr| match e {
    Expr::SymAddr(ref name) if name != "c" => Ok::<_, ()>(sym("merged")),
    e => Ok(e),
  };
  let out = map_substate_m(&mut { same }, &s).unwrap();
  assert_eq!(out.accessed_addresses, BTreeSet::from([sym("c"), sym("merged")]));
  assert_eq!(out.accessed_storage_keys, BTreeSet::from([(sym("merged"), W256::from(1u64))]));
}

#[test]
fn test_map_merges_colliding_keys() {
  let first = unknown_contract(sym("a")).to_expr();
  let second = unknown_contract(sym("b")).to_expr();
  let success = Expr::Success(
    vec![],
    Traces::default(),
    b(cbuf(&[])),
    BTreeMap::from([(addr(1), first), (addr(2), second.clone())]),
  );
  let collapsed = map_expr(|e| if e == addr(2) { addr(1) } else { e }, &success);
  match collapsed {
    Expr::Success(_, _, _, contracts) => {
      // the later key wins
      assert_eq!(contracts.len(), 1);
      assert_eq!(contracts.get(&addr(1)), Some(&second));
    }
    other => panic!("expected Success, got {}", other),
  }
}

#[test]
fn test_map_prop_m_and_aux_adapters() {
  let p = Prop::POr(Box::new(Prop::PEq(var("x"), lit(1))), Box::new(Prop::PBool(false)));
  assert_eq!(
    map_prop_m(&mut |e: Expr| Ok::<_, ()>(rename_x(e)), &p),
    Ok(Prop::POr(Box::new(Prop::PEq(var("renamed"), lit(1))), Box::new(Prop::PBool(false))))
  );

  let upper = |e: Expr| match e {
    Expr::SymAddr(name) => Ok::<_, ()>(Expr::SymAddr(name.to_uppercase())),
    e => Ok(e),
  };
  let s = map_substate_m(&mut { upper }, &sample_substate()).unwrap();
  assert_eq!(s.selfdestructs, vec![sym("DESTROYED")]);
  assert!(s.accessed_addresses.contains(&sym("ACCESSED")));
  assert_eq!(s.accessed_storage_keys.iter().next().map(|(a, _)| a.clone()), Some(sym("KEYED")));
  assert_eq!(s.refunds, vec![(sym("REFUNDED"), 100)]);

  let traces = map_traces_m(&mut { upper }, &sample_traces()).unwrap();
  assert!(traces.contracts.contains_key(&sym("C")));
  let c = map_contract_m(&mut { upper }, &sample_contract(sym("me"))).unwrap();
  assert_eq!(c.orig_storage, Expr::AbstractStore(b(sym("ME")), None));
}

#[test]
fn test_map_failure_inside_traces_aborts() {
  let partial = every_node().remove(7);
  let out = map_expr_m(
    &mut |e: Expr| match e {
      Expr::AbstractBuf(ref name) if name == "reason" => Err(name.clone()),
      e => Ok(e),
    },
    &partial,
  );
  assert_eq!(out, Err(TraversalError::Visitor("reason".to_string())));
}
