use indexmap::IndexMap;
use std::{
    collections::{BTreeMap, HashSet},
    fmt,
};

/// Identifier of a counted document: a Stack Overflow post id, or the name of a
/// mined GitHub archive. Numeric ids order before named ones.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PostId {
    Numeric(u64),
    Named(String),
}

impl PostId {
    /// Parses a JSON object key. Keys made only of ASCII digits are numeric.
    pub fn parse(key: &str) -> Self {
        if !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = key.parse() {
                return PostId::Numeric(id);
            }
        }
        PostId::Named(key.to_owned())
    }

    pub fn as_numeric(&self) -> Option<u64> {
        match self {
            PostId::Numeric(id) => Some(*id),
            PostId::Named(_) => None,
        }
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostId::Numeric(id) => write!(f, "{}", id),
            PostId::Named(name) => f.write_str(name),
        }
    }
}

/// Post ids belonging to one topic.
pub type TopicMembership = HashSet<u64>;

/// Operator occurrence counts per post, iterated in ascending post id order.
#[derive(Debug, Clone, Default)]
pub struct PostOperatorCounts {
    posts: BTreeMap<PostId, IndexMap<String, u64>>,
}

impl PostOperatorCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the counts of a post. Counts for an operator already recorded on that post are added.
    pub fn insert(&mut self, post: PostId, operators: impl IntoIterator<Item = (String, u64)>) {
        let entry = self.posts.entry(post).or_default();
        for (operator, count) in operators {
            *entry.entry(operator).or_insert(0) += count;
        }
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PostId, &IndexMap<String, u64>)> {
        self.posts.iter()
    }
}

impl FromIterator<(PostId, IndexMap<String, u64>)> for PostOperatorCounts {
    fn from_iter<I: IntoIterator<Item = (PostId, IndexMap<String, u64>)>>(iter: I) -> Self {
        let mut counts = Self::new();
        for (post, operators) in iter {
            counts.insert(post, operators);
        }
        counts
    }
}

/// Operator name to aggregated count. Iteration order is meaningful: first-seen
/// order when freshly aggregated, descending count once ranked.
#[derive(Debug, Clone, Default)]
pub struct FrequencyTable {
    entries: IndexMap<String, u64>,
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `count` to `operator`, appending it with 0 first if unseen.
    pub fn add(&mut self, operator: &str, count: u64) {
        match self.entries.get_mut(operator) {
            Some(total) => *total += count,
            None => {
                self.entries.insert(operator.to_owned(), count);
            }
        }
    }

    /// Appends every manifest operator missing from the table with a count of 0.
    pub fn seed<S: AsRef<str>>(&mut self, manifest: impl IntoIterator<Item = S>) {
        for operator in manifest {
            self.add(operator.as_ref(), 0);
        }
    }

    pub fn get(&self, operator: &str) -> Option<u64> {
        self.entries.get(operator).copied()
    }

    pub fn contains_key(&self, operator: &str) -> bool {
        self.entries.contains_key(operator)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.entries.values().sum()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// The entries in table order, mostly useful for comparisons.
    pub fn to_vec(&self) -> Vec<(&str, u64)> {
        self.iter().collect()
    }

    pub fn utilization(&self) -> Utilization {
        let used = self.entries.values().filter(|&&count| count > 0).count();
        Utilization {
            used,
            unused: self.len() - used,
        }
    }

    fn without_zeros(&self, exclude_zero: bool) -> Vec<(&String, &u64)> {
        self.entries.iter().filter(|(_, count)| !exclude_zero || **count > 0).collect()
    }
}

impl FromIterator<(String, u64)> for FrequencyTable {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (operator, count) in iter {
            table.add(&operator, count);
        }
        table
    }
}

impl<'a> FromIterator<(&'a str, u64)> for FrequencyTable {
    fn from_iter<I: IntoIterator<Item = (&'a str, u64)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (operator, count) in iter {
            table.add(operator, count);
        }
        table
    }
}

/// How many operators of a table are used at least once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Utilization {
    pub used: usize,
    pub unused: usize,
}

impl Utilization {
    pub fn total(&self) -> usize {
        self.used + self.unused
    }

    pub fn used_percent(&self) -> f64 {
        percent(self.used, self.total())
    }

    pub fn unused_percent(&self) -> f64 {
        percent(self.unused, self.total())
    }
}

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Sums the operator counts of every post, skipping posts outside `filter` when one is given.
pub fn aggregate(counts: &PostOperatorCounts, filter: Option<&TopicMembership>) -> FrequencyTable {
    let mut table = FrequencyTable::new();
    accumulate(&mut table, counts, filter);
    table
}

/// Aggregates several corpora into a single table, in the order given.
pub fn aggregate_all<'a>(corpora: impl IntoIterator<Item = &'a PostOperatorCounts>) -> FrequencyTable {
    let mut table = FrequencyTable::new();
    for counts in corpora {
        accumulate(&mut table, counts, None);
    }
    table
}

fn accumulate(table: &mut FrequencyTable, counts: &PostOperatorCounts, filter: Option<&TopicMembership>) {
    for (post, operators) in counts.iter() {
        if let Some(members) = filter {
            // Named posts never belong to a topic
            if !post.as_numeric().map_or(false, |id| members.contains(&id)) {
                continue;
            }
        }
        for (operator, &count) in operators {
            table.add(operator, count);
        }
    }
}

/// Orders the table by descending count. Equal counts keep their relative order.
pub fn rank(table: &FrequencyTable) -> FrequencyTable {
    let mut entries: Vec<_> = table.entries.iter().map(|(k, v)| (k.clone(), *v)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    FrequencyTable {
        entries: entries.into_iter().collect(),
    }
}

/// The `n` most used operators of `table`.
pub fn top_n(table: &FrequencyTable, n: usize, exclude_zero: bool) -> FrequencyTable {
    let ranked = rank(table);
    let entries = ranked.without_zeros(exclude_zero);
    FrequencyTable {
        entries: entries.into_iter().take(n).map(|(k, v)| (k.clone(), *v)).collect(),
    }
}

/// The `n` least used operators of `table`, kept in ranked (descending) order.
pub fn bottom_n(table: &FrequencyTable, n: usize, exclude_zero: bool) -> FrequencyTable {
    let ranked = rank(table);
    let entries = ranked.without_zeros(exclude_zero);
    let skip = entries.len().saturating_sub(n);
    FrequencyTable {
        entries: entries.into_iter().skip(skip).map(|(k, v)| (k.clone(), *v)).collect(),
    }
}
