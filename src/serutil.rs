use {
    serde::{ser::SerializeSeq, Deserialize, Serialize, Serializer},
    std::{
        fmt::{Display, Formatter, Result as FmtResult},
        ops::Index,
        slice::Iter,
    },
};

/// Implement Display for a given type by formatting it as pretty-printed JSON.
#[macro_export]
macro_rules! display_json {
    ($cls:ident) => {
        impl ::std::fmt::Display for $cls {
            fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                let buf = Vec::new();
                let formatter = ::serde_json::ser::PrettyFormatter::with_indent(b"    ");
                let mut ser = ::serde_json::Serializer::with_formatter(buf, formatter);
                ::serde::Serialize::serialize(self, &mut ser).map_err(|e| {
                    ::log::error!("Failed to serialize {}: {}", stringify!($cls), e);
                    ::std::fmt::Error
                })?;
                let s = ::std::string::String::from_utf8(ser.into_inner()).map_err(|_| ::std::fmt::Error)?;
                f.write_str(&s)
            }
        }
    };
}

/// Implement FromStr for a given type by parsing it as JSON.
#[macro_export]
macro_rules! from_str_json {
    ($cls:ident) => {
        impl ::std::str::FromStr for $cls {
            type Err = ::serde_json::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                ::serde_json::from_str::<Self>(s).map_err(|e| {
                    ::log::debug!("Failed to parse {}: {:?}", stringify!($cls), e);
                    e
                })
            }
        }
    };
}

/// A JSON field that may be written either as a bare element or as an array of
/// elements. The original shape is preserved on re-serialization.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(untagged)]
pub enum JsonList<T> {
    Single(T),
    List(Vec<T>),
}

impl<T> JsonList<T> {
    /// Borrow the elements as a flat vector.
    pub fn to_vec(&self) -> Vec<&T> {
        match self {
            Self::Single(el) => vec![el],
            Self::List(els) => els.iter().collect(),
        }
    }

    pub fn iter(&self) -> Iter<'_, T> {
        match self {
            Self::Single(el) => std::slice::from_ref(el).iter(),
            Self::List(els) => els.iter(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::List(els) => els.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Single(_) => false,
            Self::List(els) => els.is_empty(),
        }
    }

    /// Build a list that serializes a singleton back to the bare-element form.
    pub fn from_compact(mut els: Vec<T>) -> Self {
        if els.len() == 1 {
            Self::Single(els.remove(0))
        } else {
            Self::List(els)
        }
    }
}

impl<T> From<T> for JsonList<T> {
    fn from(el: T) -> Self {
        Self::Single(el)
    }
}

impl<T> From<Vec<T>> for JsonList<T> {
    fn from(els: Vec<T>) -> Self {
        Self::List(els)
    }
}

impl<T> Index<usize> for JsonList<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        match self {
            Self::Single(el) => {
                assert_eq!(index, 0, "index {} out of bounds for singleton", index);
                el
            }
            Self::List(els) => &els[index],
        }
    }
}

impl<T: Display> Display for JsonList<T> {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::Single(el) => write!(f, "{}", el),
            Self::List(els) => {
                f.write_str("[")?;
                for (i, el) in els.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", el)?;
                }
                f.write_str("]")
            }
        }
    }
}

impl<T: Serialize> Serialize for JsonList<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Single(el) => el.serialize(serializer),
            Self::List(els) => {
                let mut seq = serializer.serialize_seq(Some(els.len()))?;
                for el in els {
                    seq.serialize_element(el)?;
                }
                seq.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::JsonList,
        crate::display_json,
        pretty_assertions::assert_eq,
        serde::{Serialize, Serializer},
        std::fmt::Write,
    };

    #[derive(Clone, Debug)]
    struct SerFail {}
    display_json!(SerFail);

    impl Serialize for SerFail {
        fn serialize<S: Serializer>(&self, _serializer: S) -> Result<S::Ok, S::Error> {
            Err(serde::ser::Error::custom("Serialization failed"))
        }
    }

    #[derive(Clone, Debug)]
    struct SerBadUtf8 {}
    display_json!(SerBadUtf8);

    impl Serialize for SerBadUtf8 {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            let bad = unsafe { String::from_utf8_unchecked(vec![0xc0]) };
            serializer.serialize_str(&bad)
        }
    }

    #[test_log::test]
    fn test_single_round_trip() {
        let list: JsonList<String> = serde_json::from_str(r#""s3:GetObject""#).unwrap();
        assert_eq!(list, JsonList::Single("s3:GetObject".to_string()));
        assert_eq!(list.len(), 1);
        assert!(!list.is_empty());
        assert_eq!(serde_json::to_string(&list).unwrap(), r#""s3:GetObject""#);
    }

    #[test_log::test]
    fn test_list_round_trip() {
        let list: JsonList<String> = serde_json::from_str(r#"["a", "b"]"#).unwrap();
        assert_eq!(list.to_vec(), vec!["a", "b"]);
        assert_eq!(list[1], "b");
        assert_eq!(serde_json::to_string(&list).unwrap(), r#"["a","b"]"#);
    }

    #[test_log::test]
    fn test_from_compact() {
        let list = JsonList::from_compact(vec!["a".to_string()]);
        assert_eq!(serde_json::to_string(&list).unwrap(), r#""a""#);

        let list = JsonList::from_compact(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(serde_json::to_string(&list).unwrap(), r#"["a","b"]"#);
    }

    #[test_log::test]
    fn test_display_json_ser_fail() {
        assert!(serde_json::to_string(&SerFail {}).is_err());

        let mut out = String::new();
        assert!(write!(out, "{}", SerFail {}).is_err());
    }

    #[test_log::test]
    fn test_display_json_bad_utf8() {
        let mut out = String::new();
        assert!(write!(out, "{}", SerBadUtf8 {}).is_err());
    }
}
