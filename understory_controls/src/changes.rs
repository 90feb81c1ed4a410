// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

bitflags::bitflags! {
    /// Change channels a subscription can listen to.
    ///
    /// Every store mutation reports, per affected path, the set of channels it
    /// touched. Subscriptions only run when their channels intersect it.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Changes: u8 {
        /// A committed value changed on a non-transient input.
        const VALUES = 0b0000_0001;
        /// A committed value changed on a transient input.
        ///
        /// Renderers listen to this; value hooks do not.
        const TRANSIENT_VALUES = 0b0000_0010;
        /// Settings or display metadata changed.
        const SETTINGS = 0b0000_0100;
        /// The entry became visible or hidden.
        const VISIBILITY = 0b0000_1000;
        /// The path was registered or removed.
        const STRUCTURE = 0b0001_0000;
        /// The entry was enabled or disabled.
        const DISABLED = 0b0010_0000;
    }
}

impl Default for Changes {
    fn default() -> Self {
        Self::empty()
    }
}

/// Per-path change accumulator, in first-touch order.
#[derive(Clone, Debug, Default)]
pub(crate) struct ChangeLog {
    entries: Vec<(String, Changes)>,
}

impl ChangeLog {
    pub(crate) fn record(&mut self, path: &str, changes: Changes) {
        if let Some((_, existing)) = self.entries.iter_mut().find(|(p, _)| p == path) {
            *existing |= changes;
        } else {
            self.entries.push((path.to_owned(), changes));
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Union of every recorded channel.
    pub(crate) fn union(&self) -> Changes {
        self.entries
            .iter()
            .fold(Changes::empty(), |acc, (_, c)| acc | *c)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, Changes)> + '_ {
        self.entries.iter().map(|(p, c)| (p.as_str(), *c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_merge_per_path() {
        let mut log = ChangeLog::default();
        log.record("a", Changes::VALUES);
        log.record("b", Changes::STRUCTURE);
        log.record("a", Changes::VISIBILITY);

        let entries: Vec<_> = log.iter().collect();
        assert_eq!(
            entries,
            [
                ("a", Changes::VALUES | Changes::VISIBILITY),
                ("b", Changes::STRUCTURE)
            ]
        );
        assert_eq!(
            log.union(),
            Changes::VALUES | Changes::VISIBILITY | Changes::STRUCTURE
        );
    }
}
