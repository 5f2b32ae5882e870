//! Viewer reaction state machine.

use serde::Serialize;

/// The viewer's current reaction to a post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Reaction {
    #[default]
    None,
    Liked,
    Disliked,
}

/// A requested vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Vote {
    Like,
    Dislike,
}

impl Vote {
    pub fn is_like(self) -> bool {
        matches!(self, Vote::Like)
    }

    fn as_reaction(self) -> Reaction {
        match self {
            Vote::Like => Reaction::Liked,
            Vote::Dislike => Reaction::Disliked,
        }
    }
}

impl Reaction {
    pub fn from_wire(value: i8) -> Self {
        match value {
            1 => Reaction::Liked,
            -1 => Reaction::Disliked,
            _ => Reaction::None,
        }
    }

    pub fn to_wire(self) -> i8 {
        match self {
            Reaction::None => 0,
            Reaction::Liked => 1,
            Reaction::Disliked => -1,
        }
    }
}

/// Reaction plus the two counters it drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReactionTally {
    pub reaction: Reaction,
    pub likes: u32,
    pub dislikes: u32,
}

impl ReactionTally {
    /// Apply `vote` to this tally.
    ///
    /// Voting the current reaction clears it; voting from `None` sets it;
    /// voting the opposite moves one count from the old counter to the new one.
    /// Counters never go below zero.
    pub fn toggle(self, vote: Vote) -> Self {
        let requested = vote.as_reaction();
        let mut next = self;

        if self.reaction == requested {
            next.reaction = Reaction::None;
            next.decrement(requested);
        } else if self.reaction == Reaction::None {
            next.reaction = requested;
            next.increment(requested);
        } else {
            next.decrement(self.reaction);
            next.reaction = requested;
            next.increment(requested);
        }

        next
    }

    fn increment(&mut self, reaction: Reaction) {
        match reaction {
            Reaction::Liked => self.likes = self.likes.saturating_add(1),
            Reaction::Disliked => self.dislikes = self.dislikes.saturating_add(1),
            Reaction::None => {}
        }
    }

    fn decrement(&mut self, reaction: Reaction) {
        match reaction {
            Reaction::Liked => self.likes = self.likes.saturating_sub(1),
            Reaction::Disliked => self.dislikes = self.dislikes.saturating_sub(1),
            Reaction::None => {}
        }
    }
}
