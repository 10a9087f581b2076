use std::collections::{HashMap, HashSet};

use crate::heap::page_id::HeapPageID;

use super::tx::TransactionID;

/// Registry of blocked transactions. A transaction is suspended inside
/// at most one `get_page` call at a time, so one outstanding wait per
/// transaction is enough to reconstruct the waits-for graph: the edge
/// set is `waiter -> holders(waited page)`.
pub(crate) struct WaitForGraph {
    waiting_for: HashMap<TransactionID, HeapPageID>,
}

impl WaitForGraph {
    pub(crate) fn new() -> Self {
        Self {
            waiting_for: HashMap::new(),
        }
    }

    pub(crate) fn add_waiter(&mut self, tid: TransactionID, pid: HeapPageID) {
        self.waiting_for.insert(tid, pid);
    }

    pub(crate) fn remove_waiter(&mut self, tid: TransactionID) {
        self.waiting_for.remove(&tid);
    }

    pub(crate) fn waiting_page(&self, tid: TransactionID) -> Option<HeapPageID> {
        self.waiting_for.get(&tid).copied()
    }

    /// DFS from `start`, following `waiting_for[t] -> holders(page)`
    /// edges. Returns true as soon as the traversal reaches a page
    /// held by `victim`, which closes a cycle through `victim`.
    pub(crate) fn cycle_through<F>(
        &self,
        start: TransactionID,
        victim: TransactionID,
        holders_of: F,
    ) -> bool
    where
        F: Fn(&HeapPageID) -> Vec<TransactionID>,
    {
        let mut visited = HashSet::new();
        self.dfs(start, victim, &holders_of, &mut visited)
    }

    fn dfs<F>(
        &self,
        current: TransactionID,
        victim: TransactionID,
        holders_of: &F,
        visited: &mut HashSet<TransactionID>,
    ) -> bool
    where
        F: Fn(&HeapPageID) -> Vec<TransactionID>,
    {
        if !visited.insert(current) {
            return false;
        }

        let waited_page = match self.waiting_for.get(&current) {
            Some(pid) => *pid,
            None => return false,
        };

        for holder in holders_of(&waited_page) {
            if holder == victim {
                return true;
            }
            if self.dfs(holder, victim, holders_of, visited) {
                return true;
            }
        }

        false
    }

    pub(crate) fn clear(&mut self) {
        self.waiting_for.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn holders_table(
        entries: &[(HeapPageID, Vec<TransactionID>)],
    ) -> HashMap<HeapPageID, Vec<TransactionID>> {
        entries.iter().cloned().collect()
    }

    #[test]
    fn test_two_party_cycle() {
        // t1 holds p0 and waits for p1; t2 holds p1 and waits for p0
        let p0 = HeapPageID::new(1, 0);
        let p1 = HeapPageID::new(1, 1);
        let holders = holders_table(&[(p0, vec![1]), (p1, vec![2])]);

        let mut graph = WaitForGraph::new();
        graph.add_waiter(1, p1);
        graph.add_waiter(2, p0);

        // t2 transitively waits on a page t1 holds
        assert!(graph.cycle_through(2, 1, |pid| holders.get(pid).cloned().unwrap_or_default()));
    }

    #[test]
    fn test_chain_without_cycle() {
        // t1 waits for p1 (held by t2), t2 waits for p2 (held by t3),
        // t3 runs free
        let p1 = HeapPageID::new(1, 1);
        let p2 = HeapPageID::new(1, 2);
        let holders = holders_table(&[(p1, vec![2]), (p2, vec![3])]);

        let mut graph = WaitForGraph::new();
        graph.add_waiter(1, p1);
        graph.add_waiter(2, p2);

        assert!(!graph.cycle_through(2, 1, |pid| holders.get(pid).cloned().unwrap_or_default()));
    }

    #[test]
    fn test_three_party_cycle() {
        let p0 = HeapPageID::new(1, 0);
        let p1 = HeapPageID::new(1, 1);
        let p2 = HeapPageID::new(1, 2);
        let holders = holders_table(&[(p0, vec![1]), (p1, vec![2]), (p2, vec![3])]);

        let mut graph = WaitForGraph::new();
        graph.add_waiter(1, p1);
        graph.add_waiter(2, p2);
        graph.add_waiter(3, p0);

        assert!(graph.cycle_through(2, 1, |pid| holders.get(pid).cloned().unwrap_or_default()));
    }
}
