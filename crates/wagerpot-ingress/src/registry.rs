//! Match registry.
//!
//! Owns every [`Match`], hands out monotonic [`MatchId`]s, and enforces
//! the system-wide invariant that at most one match is `Open`.

use chrono::{DateTime, Utc};
use wagerpot_types::{Match, MatchId, MatchSource, Result, WagerpotError};

/// Match lifecycle owner.
///
/// Not internally synchronized: the check for an open match and the
/// insertion of a new one happen in one `&mut self` call, and the engine
/// holds its aggregate lock across that call.
pub struct MatchRegistry {
    /// Matches in creation order; `matches[i].id == MatchId(i + 1)`.
    matches: Vec<Match>,
    /// The single open match, if any.
    active: Option<MatchId>,
}

impl MatchRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            matches: Vec::new(),
            active: None,
        }
    }

    /// Open a new match between `side_a` and `side_b`.
    ///
    /// Identical labels are accepted.
    ///
    /// # Errors
    /// - `Validation` if either label is empty
    /// - `Conflict` if another match is already open
    pub fn schedule(&mut self, side_a: &str, side_b: &str, source: MatchSource) -> Result<Match> {
        if side_a.trim().is_empty() || side_b.trim().is_empty() {
            return Err(WagerpotError::validation("both sides are required"));
        }
        if let Some(active) = self.active {
            return Err(WagerpotError::Conflict { active });
        }

        let id = self
            .matches
            .last()
            .map_or(MatchId::FIRST, |m| m.id.next());
        let m = Match::open(id, side_a, side_b, source);
        self.matches.push(m.clone());
        self.active = Some(id);

        tracing::info!(match_id = id.0, side_a, side_b, "Match scheduled");
        Ok(m)
    }

    /// The open match, if any.
    #[must_use]
    pub fn active(&self) -> Option<&Match> {
        self.active.and_then(|id| self.get(id))
    }

    #[must_use]
    pub fn get(&self, id: MatchId) -> Option<&Match> {
        let idx = usize::try_from(id.0.checked_sub(1)?).ok()?;
        self.matches.get(idx).filter(|m| m.id == id)
    }

    /// Look up a match or fail with `MatchNotFound`.
    pub fn require(&self, id: MatchId) -> Result<&Match> {
        self.get(id).ok_or(WagerpotError::MatchNotFound(id))
    }

    /// Check that `id` exists, is open, and `winning_side` is one of its labels.
    pub fn check_resolvable(&self, id: MatchId, winning_side: &str) -> Result<&Match> {
        let m = self.require(id)?;
        m.check_resolvable(winning_side)?;
        Ok(m)
    }

    /// Transition `id` to `Resolved` with `winning_side` as the winner.
    ///
    /// # Errors
    /// `MatchNotFound`, `AlreadyResolved`, or `InvalidSide`.
    pub fn resolve(
        &mut self,
        id: MatchId,
        winning_side: &str,
        at: DateTime<Utc>,
    ) -> Result<Match> {
        self.check_resolvable(id, winning_side)?;
        let idx = usize::try_from(id.0 - 1)
            .map_err(|_| WagerpotError::Internal(format!("{id} out of range")))?;
        let m = self
            .matches
            .get_mut(idx)
            .ok_or(WagerpotError::MatchNotFound(id))?;
        m.mark_resolved(winning_side, at)?;
        if self.active == Some(id) {
            self.active = None;
        }
        Ok(m.clone())
    }

    /// All matches in creation order.
    #[must_use]
    pub fn list(&self) -> &[Match] {
        &self.matches
    }

    /// Number of `Open` matches; always 0 or 1.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.matches.iter().filter(|m| m.is_open()).count()
    }
}

impl Default for MatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}
