//! The address cache.

use crate::base::prefix::Prefix;
use crate::base::unix_now;
use crate::object::ObjectType;
use crate::section::{AddressAssertion, AddressZone};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::error;

//------------ CachedAddr ----------------------------------------------------

#[derive(Clone)]
struct CachedAddr<S> {
    section: Arc<S>,
    valid_until: i64,
    internal: bool,
    last_access: u64,
}

//------------ Node ----------------------------------------------------------

/// A node of the binary prefix trie.
#[derive(Default)]
struct Node {
    children: [Option<Box<Node>>; 2],
    assertions: Vec<CachedAddr<AddressAssertion>>,
    zones: Vec<CachedAddr<AddressZone>>,
}

impl Node {
    /// Descends to the node for a prefix, creating missing nodes.
    fn descend_mut(&mut self, prefix: &Prefix) -> &mut Node {
        let mut node = self;
        for pos in 0..prefix.len() {
            let branch = usize::from(prefix.bit(pos));
            node = node.children[branch].get_or_insert_with(Default::default);
        }
        node
    }

    fn retain(&mut self, now: i64) {
        self.assertions.retain(|cached| cached.valid_until >= now);
        self.zones.retain(|cached| cached.valid_until >= now);
        for child in self.children.iter_mut().flatten() {
            child.retain(now);
        }
    }

    fn len(&self) -> usize {
        self.assertions.len()
            + self.zones.len()
            + self
                .children
                .iter()
                .flatten()
                .map(|child| child.len())
                .sum::<usize>()
    }

    /// Removes the single external item with the smallest recentness.
    fn evict_lru(&mut self) -> bool {
        let mut oldest = u64::MAX;
        self.visit(&mut |node| {
            for cached in node.assertions.iter().filter(|c| !c.internal) {
                oldest = oldest.min(cached.last_access);
            }
            for cached in node.zones.iter().filter(|c| !c.internal) {
                oldest = oldest.min(cached.last_access);
            }
        });
        if oldest == u64::MAX {
            return false;
        }
        let mut removed = false;
        self.visit(&mut |node| {
            if removed {
                return;
            }
            let before = node.assertions.len() + node.zones.len();
            node.assertions
                .retain(|c| c.internal || c.last_access != oldest);
            if node.assertions.len() + node.zones.len() == before {
                node.zones
                    .retain(|c| c.internal || c.last_access != oldest);
            }
            removed = node.assertions.len() + node.zones.len() < before;
        });
        removed
    }

    fn visit(&mut self, op: &mut impl FnMut(&mut Node)) {
        op(self);
        for child in self.children.iter_mut().flatten() {
            child.visit(op);
        }
    }
}

//------------ AddressCache --------------------------------------------------

/// The reverse-lookup cache over CIDR prefixes.
///
/// Per context, two binary tries (one per address family) hold verified
/// address assertions and address zones at the node of their prefix. A
/// lookup walks the bits of the queried prefix and keeps the most
/// specific match seen on the way down.
pub struct AddressCache {
    inner: Mutex<AddressInner>,
}

struct AddressInner {
    /// Per context: the IPv4 and the IPv6 trie.
    contexts: HashMap<String, (Node, Node)>,
    counter: u64,
    max_entries: usize,
}

/// The result of an address lookup.
#[derive(Clone, Default)]
pub struct AddressAnswer {
    /// The most specific covering address assertion, if any.
    pub assertion: Option<Arc<AddressAssertion>>,

    /// The most specific covering address zone, if any.
    pub zone: Option<Arc<AddressZone>>,
}

impl AddressAnswer {
    /// Returns whether the lookup found anything.
    pub fn is_hit(&self) -> bool {
        self.assertion.is_some() || self.zone.is_some()
    }
}

impl AddressCache {
    /// Creates a cache holding at most `max_entries` sections.
    pub fn new(max_entries: usize) -> Self {
        AddressCache {
            inner: Mutex::new(AddressInner {
                contexts: HashMap::new(),
                counter: 0,
                max_entries,
            }),
        }
    }

    /// Adds a verified address assertion.
    pub fn add_assertion(
        &self,
        assertion: Arc<AddressAssertion>,
        internal: bool,
        valid_until: i64,
    ) {
        let mut inner = self.inner.lock();
        inner.counter += 1;
        let access = inner.counter;
        inner.make_room();
        let prefix = assertion.subject_addr;
        let node = inner
            .trie_mut(&assertion.context, prefix.addr())
            .descend_mut(&prefix);
        node.assertions.push(CachedAddr {
            section: assertion,
            valid_until,
            internal,
            last_access: access,
        });
    }

    /// Adds a verified address zone.
    pub fn add_zone(
        &self,
        zone: Arc<AddressZone>,
        internal: bool,
        valid_until: i64,
    ) {
        let mut inner = self.inner.lock();
        inner.counter += 1;
        let access = inner.counter;
        inner.make_room();
        let prefix = zone.subject_addr;
        let node = inner
            .trie_mut(&zone.context, prefix.addr())
            .descend_mut(&prefix);
        node.zones.push(CachedAddr {
            section: zone,
            valid_until,
            internal,
            last_access: access,
        });
    }

    /// Looks up the most specific sections covering a prefix.
    ///
    /// An address assertion only matches if it carries at least one of
    /// the requested object types; address zones match regardless.
    pub fn get(
        &self,
        context: &str,
        prefix: &Prefix,
        types: &[ObjectType],
    ) -> AddressAnswer {
        let now = unix_now();
        let mut inner = self.inner.lock();
        inner.counter += 1;
        let access = inner.counter;
        let trie = match inner.contexts.get_mut(context) {
            Some((v4, v6)) => {
                if prefix.addr().is_ipv4() {
                    v4
                } else {
                    v6
                }
            }
            None => return AddressAnswer::default(),
        };
        let mut answer = AddressAnswer::default();
        let mut node = Some(&mut *trie);
        let mut depth = 0u8;
        while let Some(current) = node {
            // Only nodes on the path whose prefix covers the query
            // qualify; deeper nodes are more specific.
            for cached in current.assertions.iter_mut() {
                if cached.valid_until < now {
                    continue;
                }
                let wanted = types.is_empty()
                    || cached
                        .section
                        .content
                        .iter()
                        .any(|obj| types.contains(&obj.object_type()));
                if wanted {
                    cached.last_access = access;
                    answer.assertion = Some(cached.section.clone());
                }
            }
            for cached in current.zones.iter_mut() {
                if cached.valid_until < now {
                    continue;
                }
                cached.last_access = access;
                answer.zone = Some(cached.section.clone());
            }
            if depth >= prefix.len() {
                break;
            }
            let branch = usize::from(prefix.bit(depth));
            node = current.children[branch].as_deref_mut();
            depth += 1;
        }
        answer
    }

    /// Removes every section expired at the time of the call.
    pub fn delete_expired_elements(&self) {
        let now = unix_now();
        let mut inner = self.inner.lock();
        for (v4, v6) in inner.contexts.values_mut() {
            v4.retain(now);
            v6.retain(now);
        }
    }

    /// Returns the number of cached sections.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .contexts
            .values()
            .map(|(v4, v6)| v4.len() + v6.len())
            .sum()
    }

    /// Returns whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AddressInner {
    fn trie_mut(&mut self, context: &str, addr: IpAddr) -> &mut Node {
        let (v4, v6) = self
            .contexts
            .entry(context.to_string())
            .or_insert_with(|| (Node::default(), Node::default()));
        if addr.is_ipv4() {
            v4
        } else {
            v6
        }
    }

    fn make_room(&mut self) {
        let len: usize = self
            .contexts
            .values()
            .map(|(v4, v6)| v4.len() + v6.len())
            .sum();
        if len < self.max_entries {
            return;
        }
        let mut evicted = false;
        for (v4, v6) in self.contexts.values_mut() {
            if v4.evict_lru() || v6.evict_lru() {
                evicted = true;
                break;
            }
        }
        if !evicted {
            error!(len, "address cache full of internal entries, cannot evict");
        }
    }
}

//============ Test ==========================================================
