//! Property tests for boot-info value coercion.

use bc_common::{coerce_value, parse_literal, Value};
use proptest::prelude::*;

proptest! {
    #[test]
    fn coerce_never_panics(raw in ".{0,64}") {
        let _ = coerce_value(&raw);
    }

    #[test]
    fn double_quoted_text_is_verbatim(inner in "[^\"]{0,32}") {
        let raw = format!("\"{}\"", inner);
        prop_assert_eq!(coerce_value(&raw), Value::Str(inner));
    }

    #[test]
    fn integers_coerce_to_ints(n in any::<i64>()) {
        prop_assert_eq!(coerce_value(&n.to_string()), Value::Int(n));
    }

    #[test]
    fn integer_tuples_coerce_to_tuples(a in -10_000i64..10_000, b in -10_000i64..10_000) {
        let raw = format!("({},{})", a, b);
        prop_assert_eq!(coerce_value(&raw), Value::pair(a, b));
    }

    #[test]
    fn bare_words_stay_strings(word in "[a-z][a-z0-9]{0,15}") {
        prop_assume!(parse_literal(&word).is_err());
        prop_assert_eq!(coerce_value(&word), Value::Str(word.clone()));
    }
}
