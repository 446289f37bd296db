use std::collections::BTreeMap;

use proptest::prelude::*;
use socklink_core::decode::MAX_DEPTH;
use socklink_core::{decode, decode_prefix, encode, DecodeError, Key, Scanner, Tag, Value};

/// Values sitting on every width-class boundary of the encoding
fn boundary_values() -> Vec<Value> {
    let mut values = vec![Value::Nil, Value::Bool(false), Value::Bool(true)];

    for n in [
        -33i64,
        -32,
        -1,
        0,
        127,
        128,
        255,
        256,
        65_535,
        65_536,
        2_147_483_647,
        -2_147_483_648,
        -2_147_483_649,
        4_294_967_296,
        i64::MIN,
    ] {
        values.push(n.into());
    }
    values.push(u64::MAX.into());

    for f in [0.0, -1.5, std::f64::consts::PI, f64::MAX, f64::MIN_POSITIVE] {
        values.push(f.into());
    }

    for len in [0usize, 31, 32, 255, 256, 65_535, 65_536] {
        values.push(Value::String("x".repeat(len)));
        values.push(Value::Binary(vec![0xab; len]));
    }

    for count in [0usize, 15, 16, 65_535, 65_536] {
        values.push(Value::Array(vec![Value::Nil; count]));
        values.push(
            (0..count)
                .map(|i| (Key::from(i), Value::from(i % 7 == 0)))
                .collect(),
        );
    }

    values.push(nested());
    values
}

fn nested() -> Value {
    let inner: Value = [(Key::from(1u8), Value::from("deep"))].into_iter().collect();
    let middle = Value::Array(vec![inner, Value::Binary(vec![0, 0, 0])]);
    let outer: Value = [
        (Key::from("a"), middle),
        (Key::from(-5i8), Value::from(-0.25)),
    ]
    .into_iter()
    .collect();
    Value::Array(vec![outer, Value::Nil])
}

#[test]
fn boundary_values_round_trip() {
    for value in boundary_values() {
        let bytes = encode(&value).unwrap();
        assert_eq!(decode(&bytes).unwrap(), value, "kind {}", value.kind());
    }
}

#[test]
fn dropping_last_byte_is_truncation() {
    for value in boundary_values() {
        let bytes = encode(&value).unwrap();
        let err = decode(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(err.is_truncated(), "kind {}: {err}", value.kind());
    }
}

#[test]
fn extra_byte_is_rejected() {
    for value in boundary_values() {
        let mut bytes = encode(&value).unwrap();
        let len = bytes.len();
        bytes.push(0xc0);
        assert_eq!(
            decode(&bytes).unwrap_err(),
            DecodeError::TrailingBytes {
                offset: len,
                remaining: 1
            }
        );
    }
}

#[test]
fn integers_use_narrowest_width() {
    let cases: &[(i64, &[u8])] = &[
        (-33, &[0xd0, 0xdf]),
        (-32, &[0xe0]),
        (-1, &[0xff]),
        (0, &[0x00]),
        (127, &[0x7f]),
        (128, &[0xcc, 0x80]),
        (255, &[0xcc, 0xff]),
        (256, &[0xcd, 0x01, 0x00]),
        (65_535, &[0xcd, 0xff, 0xff]),
        (65_536, &[0xce, 0x00, 0x01, 0x00, 0x00]),
        (2_147_483_647, &[0xce, 0x7f, 0xff, 0xff, 0xff]),
        (-128, &[0xd0, 0x80]),
        (-129, &[0xd1, 0xff, 0x7f]),
        (-2_147_483_648, &[0xd2, 0x80, 0x00, 0x00, 0x00]),
        (
            4_294_967_296,
            &[0xcf, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00],
        ),
        (
            i64::MIN,
            &[0xd3, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
        ),
    ];
    for (n, expected) in cases {
        assert_eq!(encode(&Value::from(*n)).unwrap(), *expected, "{n}");
    }
}

#[test]
fn headers_use_narrowest_size_class() {
    let header = |value: Value, len: usize| encode(&value).unwrap()[..len].to_vec();

    assert_eq!(header(Value::String("x".repeat(31)), 1), [0xbf]);
    assert_eq!(header(Value::String("x".repeat(32)), 2), [0xd9, 32]);
    assert_eq!(header(Value::String("x".repeat(256)), 3), [0xda, 0x01, 0x00]);
    assert_eq!(
        header(Value::String("x".repeat(65_536)), 5),
        [0xdb, 0x00, 0x01, 0x00, 0x00]
    );

    assert_eq!(header(Value::Binary(vec![]), 2), [0xc4, 0]);
    assert_eq!(header(Value::Binary(vec![1; 256]), 3), [0xc5, 0x01, 0x00]);

    assert_eq!(header(Value::Array(vec![Value::Nil; 15]), 1), [0x9f]);
    assert_eq!(header(Value::Array(vec![Value::Nil; 16]), 3), [0xdc, 0x00, 16]);
    assert_eq!(
        header(Value::Array(vec![Value::Nil; 65_536]), 5),
        [0xdd, 0x00, 0x01, 0x00, 0x00]
    );

    let map = |n: usize| (0..n).map(|i| (Key::from(i), Value::Nil)).collect::<Value>();
    assert_eq!(header(map(15), 1), [0x8f]);
    assert_eq!(header(map(16), 3), [0xde, 0x00, 16]);
}

#[test]
fn floats_always_encode_as_float64() {
    let mut expected = vec![0xcb];
    expected.extend_from_slice(&2.0f64.to_be_bytes());
    assert_eq!(encode(&Value::Float(2.0)).unwrap(), expected);
}

#[test]
fn float32_decodes_to_float() {
    let mut bytes = vec![0xca];
    bytes.extend_from_slice(&1.5f32.to_be_bytes());
    assert_eq!(decode(&bytes).unwrap(), Value::Float(1.5));
}

#[test]
fn wide_encodings_canonicalize() {
    // uint16 carrying a fixint-sized value
    assert_eq!(decode(&[0xcd, 0x00, 0x05]).unwrap(), Value::from(5));
    // int64 carrying a positive value
    assert_eq!(
        decode(&[0xd3, 0, 0, 0, 0, 0, 0, 0x01, 0x00]).unwrap(),
        Value::from(256u16)
    );
    // str8 carrying a short string
    assert_eq!(decode(&[0xd9, 0x02, b'h', b'i']).unwrap(), Value::from("hi"));
}

#[test]
fn reserved_byte_is_rejected() {
    assert_eq!(
        decode(&[0xc1]).unwrap_err(),
        DecodeError::Reserved {
            tag: 0xc1,
            offset: 0
        }
    );
}

#[test]
fn extension_types_are_rejected() {
    for tag in [0xc7u8, 0xc8, 0xc9, 0xd4, 0xd5, 0xd6, 0xd7, 0xd8] {
        let err = decode(&[0x91, tag, 0x00, 0x00]).unwrap_err();
        assert_eq!(err, DecodeError::Extension { tag, offset: 1 });
    }
}

#[test]
fn map_keys_must_be_strings_or_integers() {
    // {nil: 1}
    assert_eq!(
        decode(&[0x81, 0xc0, 0x01]).unwrap_err(),
        DecodeError::InvalidKey { offset: 1 }
    );
    // {[]: 1}
    assert!(matches!(
        decode(&[0x81, 0x90, 0x01]),
        Err(DecodeError::InvalidKey { .. })
    ));
}

#[test]
fn duplicate_map_keys_keep_last() {
    // {"a": 1, "a": 2}
    let value = decode(&[0x82, 0xa1, b'a', 0x01, 0xa1, b'a', 0x02]).unwrap();
    assert_eq!(value.get("a"), Some(&Value::from(2)));
    assert_eq!(value.as_map().map(BTreeMap::len), Some(1));
}

#[test]
fn invalid_utf8_is_rejected() {
    assert_eq!(
        decode(&[0xa2, 0xff, 0xfe]).unwrap_err(),
        DecodeError::InvalidUtf8 { offset: 1 }
    );
}

#[test]
fn oversized_count_fails_without_allocating() {
    // array32 claiming u32::MAX elements, followed by a single nil
    let err = decode(&[0xdd, 0xff, 0xff, 0xff, 0xff, 0xc0]).unwrap_err();
    assert!(err.is_truncated());

    // bin32 claiming 4 GiB
    let err = decode(&[0xc6, 0xff, 0xff, 0xff, 0xff, 0x00]).unwrap_err();
    assert_eq!(
        err,
        DecodeError::Truncated {
            offset: 5,
            needed: 0xffff_ffff - 1
        }
    );
}

#[test]
fn nesting_is_bounded() {
    let bytes = vec![0x91; MAX_DEPTH + 1];
    assert!(matches!(
        decode(&bytes),
        Err(DecodeError::TooDeep { .. })
    ));
}

/// `MAX_DEPTH` single-element arrays wrapped around nil
fn deepest() -> Vec<u8> {
    let mut bytes = vec![0x91; MAX_DEPTH];
    bytes.push(0xc0);
    bytes
}

#[test]
fn deepest_nesting_fits_a_small_stack() {
    let worker = std::thread::Builder::new()
        .stack_size(2 * 1024 * 1024)
        .spawn(|| {
            let value = decode(&deepest()).unwrap();

            let mut depth = 0;
            let mut cursor = &value;
            while let Value::Array(items) = cursor {
                depth += 1;
                cursor = &items[0];
            }
            assert_eq!(depth, MAX_DEPTH);
            assert_eq!(cursor, &Value::Nil);

            let mut too_deep = vec![0x91; MAX_DEPTH + 1];
            too_deep.push(0xc0);
            assert_eq!(
                decode(&too_deep).unwrap_err(),
                DecodeError::TooDeep {
                    limit: MAX_DEPTH,
                    offset: MAX_DEPTH
                }
            );
        })
        .unwrap();
    worker.join().unwrap();
}

#[test]
fn nested_map_keys_report_their_own_offset() {
    // {[1]: nil}: the key is an array starting right after the map header
    let err = decode(&[0x81, 0x91, 0x01, 0xc0]).unwrap_err();
    assert_eq!(err, DecodeError::InvalidKey { offset: 1 });
}

/// Feed `bytes` to a scanner in growing prefixes of `step` bytes
fn scan_in_steps(bytes: &[u8], step: usize) -> (usize, Result<Option<usize>, DecodeError>) {
    let mut scanner = Scanner::new();
    let mut fed = 0;
    loop {
        fed = (fed + step).min(bytes.len());
        match scanner.scan(&bytes[..fed]) {
            Ok(None) if fed < bytes.len() => continue,
            result => return (fed, result),
        }
    }
}

#[test]
fn scanner_finds_end_of_each_boundary_value() {
    for value in boundary_values() {
        let bytes = encode(&value).unwrap();
        for step in [1, 7, 1024] {
            let (fed, result) = scan_in_steps(&bytes, step);
            assert_eq!(fed, bytes.len(), "kind {} step {step}", value.kind());
            assert_eq!(result, Ok(Some(bytes.len())), "kind {} step {step}", value.kind());
        }
    }
}

#[test]
fn scanner_ignores_bytes_after_the_value() {
    let mut scanner = Scanner::new();
    assert_eq!(scanner.scan(&[0x92, 0x00]), Ok(None));
    assert_eq!(scanner.scan(&[0x92, 0x00, 0x00, 0x00]), Ok(Some(3)));
    assert_eq!(scanner.position(), 3);
}

#[test]
fn scanner_waits_for_whole_strings() {
    let bytes = encode(&Value::from("x".repeat(300))).unwrap();
    let mut scanner = Scanner::new();
    assert_eq!(scanner.scan(&bytes[..1]), Ok(None));
    assert_eq!(scanner.scan(&bytes[..299]), Ok(None));
    assert_eq!(scanner.scan(&bytes), Ok(Some(bytes.len())));
}

#[test]
fn scanner_rejects_what_decoding_rejects_structurally() {
    assert_eq!(
        Scanner::new().scan(&[0x91, 0xc1]),
        Err(DecodeError::Reserved {
            tag: 0xc1,
            offset: 1
        })
    );
    assert_eq!(
        Scanner::new().scan(&[0xd4, 0x01, 0x02]),
        Err(DecodeError::Extension {
            tag: 0xd4,
            offset: 0
        })
    );
    assert_eq!(
        Scanner::new().scan(&deepest()),
        Ok(Some(MAX_DEPTH + 1))
    );
    assert!(matches!(
        Scanner::new().scan(&[0x91; MAX_DEPTH + 1]),
        Err(DecodeError::TooDeep { .. })
    ));
}

#[test]
fn empty_input_is_truncated() {
    assert_eq!(
        decode(&[]).unwrap_err(),
        DecodeError::Truncated {
            offset: 0,
            needed: 1
        }
    );
}

#[test]
fn prefix_decode_reports_consumed_length() {
    let (value, used) = decode_prefix(&[0xa2, b'o', b'k', 0x00, 0xff]).unwrap();
    assert_eq!(value, Value::from("ok"));
    assert_eq!(used, 3);
}

#[test]
fn every_byte_maps_to_a_tag_and_back() {
    for byte in 0..=u8::MAX {
        assert_eq!(Tag::from_byte(byte).byte(), byte);
    }
}

fn arb_key() -> impl Strategy<Value = Key> {
    prop_oneof![
        any::<i64>().prop_map(Key::from),
        any::<u64>().prop_map(Key::from),
        ".{0,40}".prop_map(Key::from),
    ]
}

fn arb_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Nil),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        any::<u64>().prop_map(Value::from),
        (-1.0e12f64..1.0e12).prop_map(Value::from),
        ".{0,40}".prop_map(Value::from),
        proptest::collection::vec(any::<u8>(), 0..300).prop_map(Value::from),
    ];
    leaf.prop_recursive(4, 64, 20, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 0..20).prop_map(Value::Array),
            proptest::collection::btree_map(arb_key(), inner, 0..20).prop_map(Value::Map),
        ]
    })
}

proptest! {
    #[test]
    fn any_value_round_trips(value in arb_value()) {
        let bytes = encode(&value).unwrap();
        prop_assert_eq!(decode(&bytes).unwrap(), value);
    }

    #[test]
    fn strict_prefixes_are_truncated(value in arb_value(), cut in any::<prop::sample::Index>()) {
        let bytes = encode(&value).unwrap();
        let cut = cut.index(bytes.len());
        prop_assert!(decode(&bytes[..cut]).unwrap_err().is_truncated());
    }

    #[test]
    fn arbitrary_bytes_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let _ = decode(&bytes);
        let _ = Scanner::new().scan(&bytes);
    }

    #[test]
    fn scanner_agrees_with_prefix_decode(value in arb_value(), step in 1usize..64) {
        let bytes = encode(&value).unwrap();
        let (fed, result) = scan_in_steps(&bytes, step);
        prop_assert_eq!(fed, bytes.len());
        prop_assert_eq!(result, Ok(Some(decode_prefix(&bytes).unwrap().1)));
    }
}
