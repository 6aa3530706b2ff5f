use crate::saveable::ItemId;

use ahash::HashMap;
use generational_arena::{Arena, Index};

#[derive(Debug)]
pub(crate) struct Node<T> {
  pub(crate) id: ItemId,
  pub(crate) value: T,
  pub(crate) cost: u64,
  pub(crate) next: Option<Index>,
  pub(crate) prev: Option<Index>,
}

// A cost-tracking recency list keyed by item id.
// Backs both the owning `MruList` and the cache's resident index.
#[derive(Debug)]
pub(crate) struct RecencyList<T> {
  // Arena stores all nodes contiguously.
  pub(crate) nodes: Arena<Node<T>>,
  // O(1) lookup of an id to its node index in the arena.
  pub(crate) lookup: HashMap<ItemId, Index>,
  // Head is the most-recently-used item.
  pub(crate) head: Option<Index>,
  // Tail is the least-recently-used item.
  pub(crate) tail: Option<Index>,
  // Total cost of all items in the list.
  pub(crate) current_cost: u64,
}

impl<T> RecencyList<T> {
  pub fn new() -> Self {
    Self {
      nodes: Arena::new(),
      lookup: HashMap::default(),
      head: None,
      tail: None,
      current_cost: 0,
    }
  }

  // Unlinks a node without removing it from the arena or the lookup map.
  fn unlink(&mut self, index: Index) {
    let node = &self.nodes[index];
    let prev_node_idx = node.prev;
    let next_node_idx = node.next;

    if let Some(prev_idx) = prev_node_idx {
      self.nodes[prev_idx].next = next_node_idx;
    } else {
      self.head = next_node_idx;
    }

    if let Some(next_idx) = next_node_idx {
      self.nodes[next_idx].prev = prev_node_idx;
    } else {
      self.tail = prev_node_idx;
    }
  }

  // Links an arena node in as the new head.
  fn push_front_node(&mut self, index: Index) {
    let old_head_idx = self.head;
    self.nodes[index].next = old_head_idx;
    self.nodes[index].prev = None;
    self.head = Some(index);

    if let Some(old_head) = old_head_idx {
      self.nodes[old_head].prev = Some(index);
    }

    if self.tail.is_none() {
      self.tail = Some(index);
    }
  }

  #[inline]
  pub fn contains(&self, id: ItemId) -> bool {
    self.lookup.contains_key(&id)
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.lookup.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.lookup.is_empty()
  }

  #[inline]
  pub fn current_total_cost(&self) -> u64 {
    self.current_cost
  }

  /// Pushes `value` to the front.
  ///
  /// If `id` is already present the existing entry is relocated, its cost is
  /// replaced by `cost` and the incoming `value` is dropped. Returns `true`
  /// only for a new entry.
  pub fn push_front(&mut self, id: ItemId, value: T, cost: u64) -> bool {
    if let Some(&index) = self.lookup.get(&id) {
      let old_cost = self.nodes[index].cost;
      self.current_cost = self.current_cost.saturating_sub(old_cost) + cost;
      self.nodes[index].cost = cost;
      self.move_to_front(id);
      false
    } else {
      let index = self.nodes.insert(Node {
        id,
        value,
        cost,
        next: None,
        prev: None,
      });
      self.lookup.insert(id, index);
      self.current_cost += cost;
      self.push_front_node(index);
      true
    }
  }

  pub fn move_to_front(&mut self, id: ItemId) -> bool {
    match self.lookup.get(&id) {
      Some(&index) => {
        if self.head != Some(index) {
          self.unlink(index);
          self.push_front_node(index);
        }
        true
      }
      None => false,
    }
  }

  pub fn get(&self, id: ItemId) -> Option<&T> {
    self.lookup.get(&id).map(|&index| &self.nodes[index].value)
  }

  pub fn head_id(&self) -> Option<ItemId> {
    self.head.map(|index| self.nodes[index].id)
  }

  pub fn tail_id(&self) -> Option<ItemId> {
    self.tail.map(|index| self.nodes[index].id)
  }

  /// The id of the entry one step closer to the head than `id`.
  pub fn prev_id(&self, id: ItemId) -> Option<ItemId> {
    let index = *self.lookup.get(&id)?;
    self.nodes[index].prev.map(|prev| self.nodes[prev].id)
  }

  pub fn pop_back(&mut self) -> Option<(ItemId, T, u64)> {
    let id = self.tail_id()?;
    self.remove(id).map(|(value, cost)| (id, value, cost))
  }

  pub fn remove(&mut self, id: ItemId) -> Option<(T, u64)> {
    let index = self.lookup.remove(&id)?;
    self.unlink(index);
    let node = self.nodes.remove(index)?;
    self.current_cost = self.current_cost.saturating_sub(node.cost);
    Some((node.value, node.cost))
  }

  /// Iterates from the most to the least recently used entry.
  pub fn iter(&self) -> Iter<'_, T> {
    Iter {
      list: self,
      next: self.head,
    }
  }

  /// Ids ordered from head to tail.
  pub fn ids(&self) -> Vec<ItemId> {
    self.iter().map(|(id, _, _)| id).collect()
  }
}

impl<T> Default for RecencyList<T> {
  fn default() -> Self {
    Self::new()
  }
}

pub(crate) struct Iter<'a, T> {
  list: &'a RecencyList<T>,
  next: Option<Index>,
}

impl<'a, T> Iterator for Iter<'a, T> {
  type Item = (ItemId, &'a T, u64);

  fn next(&mut self) -> Option<Self::Item> {
    let index = self.next?;
    let list = self.list;
    let node = &list.nodes[index];
    self.next = node.next;
    Some((node.id, &node.value, node.cost))
  }
}
