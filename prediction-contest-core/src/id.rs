use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

macro_rules! id {
    ($(#[$meta:meta])* $name:ident, $id:ty) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
        #[cfg_attr(feature = "serde", serde(transparent))]
        #[repr(transparent)]
        pub struct $name(pub $id);

        impl Display for $name {
            #[inline]
            fn fmt(&self, f: &mut Formatter) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl AsRef<$id> for $name {
            #[inline]
            fn as_ref(&self) -> &$id {
                &self.0
            }
        }

        impl PartialEq<$id> for $name {
            #[inline]
            fn eq(&self, other: &$id) -> bool {
                self.0 == *other
            }
        }

        impl From<$id> for $name {
            #[inline]
            fn from(id: $id) -> Self {
                Self(id)
            }
        }

        impl FromStr for $name {
            type Err = <$id as FromStr>::Err;

            #[inline]
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse::<$id>()?))
            }
        }
    };
}

id!(TournamentId, u64);
id!(MatchId, u64);
id!(TeamId, u64);
id!(PlayerId, u64);
id!(
    /// A registered predictor.
    UserId,
    u64
);

/// The identity of a [`Prediction`]. There is at most one prediction per user and match.
///
/// [`Prediction`]: crate::Prediction
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PredictionKey {
    pub user: UserId,
    pub match_id: MatchId,
}

impl PredictionKey {
    #[inline]
    pub const fn new(user: UserId, match_id: MatchId) -> Self {
        Self { user, match_id }
    }
}

impl Display for PredictionKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.user, self.match_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseKeyError;

impl Display for ParseKeyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("expected a key in the form `<user>_<match>`")
    }
}

impl std::error::Error for ParseKeyError {}

impl FromStr for PredictionKey {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (user, match_id) = s.split_once('_').ok_or(ParseKeyError)?;

        Ok(Self {
            user: user.parse().map_err(|_| ParseKeyError)?,
            match_id: match_id.parse().map_err(|_| ParseKeyError)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{MatchId, PredictionKey, UserId};

    #[test]
    fn test_prediction_key() {
        let key = PredictionKey::new(UserId(7), MatchId(42));
        assert_eq!(key.to_string(), "7_42");
        assert_eq!("7_42".parse::<PredictionKey>().unwrap(), key);

        assert!("742".parse::<PredictionKey>().is_err());
        assert!("a_42".parse::<PredictionKey>().is_err());
    }
}
