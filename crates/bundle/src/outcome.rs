/// Fan-out result over independent units of work (targets, files).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Aggregate<K> {
    AllSucceeded(Vec<K>),
    PartialSuccess { succeeded: Vec<K>, failed: Vec<K> },
    AllFailed(Vec<K>),
}

impl<K: Clone> Aggregate<K> {
    /// An empty input counts as all-succeeded.
    pub fn from_results<'a, T: 'a, E: 'a, I>(results: I) -> Self
    where
        I: IntoIterator<Item = (K, &'a Result<T, E>)>,
    {
        let (succeeded, failed) = results.into_iter().fold(
            (Vec::new(), Vec::new()),
            |(mut ok, mut err), (key, result)| {
                match result {
                    Ok(_) => ok.push(key),
                    Err(_) => err.push(key),
                }
                (ok, err)
            },
        );
        Self::from_parts(succeeded, failed)
    }

    pub fn from_parts(succeeded: Vec<K>, failed: Vec<K>) -> Self {
        match (succeeded.is_empty(), failed.is_empty()) {
            (_, true) => Aggregate::AllSucceeded(succeeded),
            (true, false) => Aggregate::AllFailed(failed),
            (false, false) => Aggregate::PartialSuccess { succeeded, failed },
        }
    }

    pub fn succeeded(&self) -> &[K] {
        match self {
            Aggregate::AllSucceeded(ok) | Aggregate::PartialSuccess { succeeded: ok, .. } => ok,
            Aggregate::AllFailed(_) => &[],
        }
    }

    pub fn failed(&self) -> &[K] {
        match self {
            Aggregate::AllFailed(err) | Aggregate::PartialSuccess { failed: err, .. } => err,
            Aggregate::AllSucceeded(_) => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.succeeded().len() + self.failed().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
