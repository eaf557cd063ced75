use std::collections::BTreeMap;

use log::{debug, trace};

use crate::modules::expr::{subst_gvars, SubstError};
use crate::modules::traversals::{TraversableTerm, TraversalError};
use crate::modules::types::{Expr, GVar, Prop};

/// Represents the internal state used during the expression elimination process.
///
/// The state maps every buffer and storage write seen so far to the index of the placeholder that
/// replaced it. Buffers and stores share one counter, so indices are unique across both.
#[derive(Debug, Default, Clone)]
pub struct BuilderState {
  bufs: BTreeMap<Expr, i32>,
  stores: BTreeMap<Expr, i32>,
  count: i32,
}

/// Maps placeholder indices to the buffer expressions they stand for.
pub type BufEnv = BTreeMap<i32, Expr>;

/// Maps placeholder indices to the storage expressions they stand for.
pub type StoreEnv = BTreeMap<i32, Expr>;

/// Initializes and returns a new `BuilderState` with empty mappings and a zeroed counter.
pub fn init_state() -> BuilderState {
  BuilderState::default()
}

impl BuilderState {
  /// Replaces a buffer or storage write by its placeholder, allocating a new index the first time
  /// a write is seen. Every other expression is returned unchanged.
  ///
  /// Used as a map visitor, so the operands of `expr` have already been replaced.
  fn go(&mut self, expr: Expr) -> Expr {
    match expr {
      Expr::WriteWord(..) | Expr::WriteByte(..) | Expr::CopySlice(..) => {
        let idx = Self::index_of(&mut self.bufs, &mut self.count, expr);
        Expr::GVar(GVar::buf(idx))
      }
      Expr::SStore(..) => {
        let idx = Self::index_of(&mut self.stores, &mut self.count, expr);
        Expr::GVar(GVar::store(idx))
      }
      e => e,
    }
  }

  fn index_of(seen: &mut BTreeMap<Expr, i32>, count: &mut i32, expr: Expr) -> i32 {
    if let Some(&idx) = seen.get(&expr) {
      return idx;
    }
    let idx = *count;
    trace!("cse: {} becomes placeholder {}", expr.tag(), idx);
    seen.insert(expr, idx);
    *count += 1;
    idx
  }

  /// Environments recovering the expression behind each placeholder index.
  pub fn envs(&self) -> (BufEnv, StoreEnv) {
    (invert_key_val(&self.bufs), invert_key_val(&self.stores))
  }
}

/// Inverts the key-value pairs of a map.
fn invert_key_val<K, V>(map: &BTreeMap<K, V>) -> BTreeMap<V, K>
where
  K: Clone,
  V: Ord + Clone,
{
  map.iter().map(|(k, v)| (v.clone(), k.clone())).collect()
}

/// Replaces every buffer and storage write in `e` by a numbered placeholder.
///
/// # Arguments
///
/// * `e` - The expression to be processed.
///
/// # Returns
///
/// * `(Expr, BufEnv, StoreEnv)` - The transformed expression and the buffer and storage
///   environments binding each placeholder.
pub fn eliminate_expr(e: &Expr) -> (Expr, BufEnv, StoreEnv) {
  let mut state = init_state();
  let e_prime = e.map_term(|e| state.go(e));
  let (bufs, stores) = state.envs();
  debug!("cse: {} buffer and {} storage placeholders", bufs.len(), stores.len());
  (e_prime, bufs, stores)
}

/// Eliminates writes from a list of propositions, sharing `state` across all of them so equal
/// writes in different propositions get the same placeholder.
///
/// # Arguments
///
/// * `state` - The state to extend.
/// * `props` - The propositions to process.
///
/// # Returns
///
/// * `Vec<Prop>` - The transformed propositions, in input order.
pub fn eliminate_props_prime(state: &mut BuilderState, props: &[Prop]) -> Vec<Prop> {
  props.iter().map(|p| p.map_term(|e| state.go(e))).collect()
}

/// Processes a list of propositions by eliminating writes within them.
///
/// # Arguments
///
/// * `props` - The propositions to process.
///
/// # Returns
///
/// * `(Vec<Prop>, BufEnv, StoreEnv)` - The transformed propositions and the buffer and storage
///   environments.
pub fn eliminate_props(props: &[Prop]) -> (Vec<Prop>, BufEnv, StoreEnv) {
  let mut state = init_state();
  let props_prime = eliminate_props_prime(&mut state, props);
  let (bufs, stores) = state.envs();
  debug!("cse: {} props, {} buffer and {} storage placeholders", props.len(), bufs.len(), stores.len());
  (props_prime, bufs, stores)
}

/// Undoes `eliminate_expr`/`eliminate_props`: every placeholder is replaced by the expression it
/// stands for, with placeholders inside environment entries resolved first.
///
/// # Errors
///
/// `SubstError::Unbound` when `t` or an entry mentions an index missing from the environments.
pub fn inline_gvars<T: TraversableTerm>(
  t: &T,
  bufs: &BufEnv,
  stores: &StoreEnv,
) -> Result<T, TraversalError<SubstError>> {
  let mut entries: Vec<(GVar, &Expr)> = bufs.iter().map(|(i, e)| (GVar::buf(*i), e)).collect();
  entries.extend(stores.iter().map(|(i, e)| (GVar::store(*i), e)));
  // an entry only mentions placeholders allocated before it
  entries.sort_by_key(|(g, _)| g.idx);

  let mut resolved = BTreeMap::new();
  for (g, e) in entries {
    let e = subst_gvars(e, &resolved)?;
    resolved.insert(g, e);
  }
  subst_gvars(t, &resolved)
}
