//! Capability-map lookup properties.
//!
//! Covers alias disambiguation by capability, determinism and the
//! two-descriptor board scenario used throughout the HAL tests.

use embr_common::pin::{Capability, PinDesc, PinKey, PinMap};

fn board_a() -> PinMap {
    PinMap::new(vec![
        PinDesc::new("P1", &["1", "GPIO1"], Capability::DIGITAL),
        PinDesc::new("P2", &["1"], Capability::ANALOG),
    ])
}

fn id_of(map: &PinMap, key: impl Into<PinKey>, caps: Capability) -> Option<String> {
    map.lookup(key, caps).map(|pd| pd.id.clone())
}

#[test]
fn test_board_a_scenario() {
    let map = board_a();
    assert_eq!(id_of(&map, "1", Capability::DIGITAL).as_deref(), Some("P1"));
    assert_eq!(id_of(&map, "1", Capability::ANALOG).as_deref(), Some("P2"));
    assert_eq!(id_of(&map, "GPIO1", Capability::DIGITAL).as_deref(), Some("P1"));
    assert_eq!(id_of(&map, "99", Capability::DIGITAL), None);
}

#[test]
fn test_integer_and_string_keys_agree() {
    let map = board_a();
    for caps in [Capability::DIGITAL, Capability::ANALOG, Capability::PWM] {
        assert_eq!(id_of(&map, 1, caps), id_of(&map, "1", caps));
        assert_eq!(id_of(&map, 1u8, caps), id_of(&map, PinKey::ident(1), caps));
    }
}

#[test]
fn test_shared_alias_is_disambiguated_by_capability() {
    let map = PinMap::new(vec![
        PinDesc::new("AIN", &["10"], Capability::ANALOG),
        PinDesc::new("DIO", &["10"], Capability::DIGITAL),
    ]);
    for _ in 0..100 {
        assert_eq!(id_of(&map, "10", Capability::ANALOG).as_deref(), Some("AIN"));
        assert_eq!(id_of(&map, "10", Capability::DIGITAL).as_deref(), Some("DIO"));
    }
    // Neither descriptor serves PWM, so the alias resolves to nothing.
    assert_eq!(id_of(&map, "10", Capability::PWM), None);
}

#[test]
fn test_multi_capability_request_takes_first_overlap() {
    let map = board_a();
    let either = Capability::DIGITAL | Capability::ANALOG;
    assert_eq!(id_of(&map, "1", either).as_deref(), Some("P1"));
}
