/// Declares a strongly-typed id wrapping a primitive integer.
///
/// The wrapper is `repr(transparent)` and serializes as the bare
/// integer, so ids cross the wire without any envelope. `Display`
/// prints the raw value; `Debug` keeps the type name for logs.
#[macro_export]
macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $raw:ty) => {
        $(#[$meta])*
        #[derive(
            Clone,
            Copy,
            Debug,
            Default,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        #[repr(transparent)]
        pub struct $name(pub $raw);

        impl $name {
            #[inline]
            pub fn raw(self) -> $raw {
                self.0
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$raw> for $name {
            #[inline]
            fn from(raw: $raw) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for $raw {
            #[inline]
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    id_type!(ProbeId, u32);

    #[test]
    fn test_raw_access() {
        let id = ProbeId(7);
        assert_eq!(id.raw(), 7);
        assert_eq!(id.0, 7);
    }

    #[test]
    fn test_conversions() {
        let id: ProbeId = 42u32.into();
        let raw: u32 = id.into();
        assert_eq!(raw, 42);
    }

    #[test]
    fn test_display_and_debug() {
        let id = ProbeId(9);
        assert_eq!(format!("{}", id), "9");
        assert_eq!(format!("{:?}", id), "ProbeId(9)");
    }

    #[test]
    fn test_hash_and_ord() {
        let mut set = HashSet::new();
        set.insert(ProbeId(1));
        set.insert(ProbeId(2));
        set.insert(ProbeId(1));
        assert_eq!(set.len(), 2);
        assert!(ProbeId(1) < ProbeId(2));
    }

    #[test]
    fn test_serde_transparent() {
        let id = ProbeId(123);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "123");
        let back: ProbeId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
