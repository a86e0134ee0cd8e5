/// Helper macro to implement string based serialization.
///
/// If a type implements `Display` then this automatically
/// implements a serializer for that type that dispatches
/// appropriately.
#[macro_export]
macro_rules! impl_str_ser {
    ($type:ty) => {
        impl ::serde::ser::Serialize for $type {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: ::serde::ser::Serializer,
            {
                serializer.collect_str(self)
            }
        }
    };
}

/// Helper macro to implement string based deserialization.
///
/// If a type implements `FromStr` then this automatically
/// implements a deserializer for that type that dispatches
/// appropriately. Values that fail to parse are reported as
/// invalid values with the given expectation.
#[macro_export]
macro_rules! impl_str_de {
    ($type:ty, $expectation:expr) => {
        impl<'de> ::serde::de::Deserialize<'de> for $type {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: ::serde::de::Deserializer<'de>,
            {
                struct V;

                impl ::serde::de::Visitor<'_> for V {
                    type Value = $type;

                    fn expecting(
                        &self,
                        formatter: &mut ::std::fmt::Formatter<'_>,
                    ) -> ::std::fmt::Result {
                        formatter.write_str($expectation)
                    }

                    fn visit_str<E>(self, value: &str) -> Result<$type, E>
                    where
                        E: ::serde::de::Error,
                    {
                        value.parse().map_err(|_| {
                            ::serde::de::Error::invalid_value(
                                ::serde::de::Unexpected::Str(value),
                                &self,
                            )
                        })
                    }
                }

                deserializer.deserialize_str(V)
            }
        }
    };
}

/// Helper macro to implement string based serialization and deserialization.
///
/// If a type implements `FromStr` and `Display` then this automatically
/// implements a serializer/deserializer for that type that dispatches
/// appropriately.
#[macro_export]
macro_rules! impl_str_serde {
    ($type:ty, $expectation:expr) => {
        $crate::impl_str_ser!($type);
        $crate::impl_str_de!($type, $expectation);
    };
}

#[cfg(test)]
mod tests {
    use std::fmt;
    use std::str::FromStr;

    #[derive(Debug, PartialEq)]
    struct Shout(String);

    impl fmt::Display for Shout {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.0)
        }
    }

    impl FromStr for Shout {
        type Err = ();

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            if s.chars().all(|c| c.is_ascii_uppercase()) {
                Ok(Self(s.to_owned()))
            } else {
                Err(())
            }
        }
    }

    impl_str_serde!(Shout, "an uppercase word");

    #[test]
    fn test_str_serde() {
        let shout: Shout = serde_json::from_str("\"HEY\"").unwrap();
        assert_eq!(shout, Shout("HEY".to_owned()));
        assert_eq!(serde_json::to_string(&shout).unwrap(), "\"HEY\"");
    }

    #[test]
    fn test_str_de_invalid() {
        let error = serde_json::from_str::<Shout>("\"hey\"").unwrap_err();
        assert!(error.to_string().contains("an uppercase word"));
    }
}
