use lorawan_device::lorawan::{
    channel_list::ChannelList,
    region::{EU868, US915},
};

fn eu868() -> ChannelList<EU868> {
    ChannelList::new(EU868::new())
}

#[test]
fn test_default_channels() {
    let list = eu868();

    assert_eq!(list.capacity(), 16);
    assert_eq!(list.num_unmasked(), 3);
    assert_eq!(list.band_unmasked(2), 3);
    assert_eq!(list.next_band(), Some(2));
    assert_eq!(list.next_channel(), Some(0));

    let ch = list.channel(1).unwrap();
    assert_eq!(ch.frequency, 868_300_000);
    assert_eq!((ch.min_rate, ch.max_rate), (0, 5));
    assert!(list.channel(16).is_none());
}

#[test]
fn test_add_validates_index_and_frequency() {
    let mut list = eu868();

    assert!(!list.add(16, 867_100_000));
    assert!(!list.add(3, 915_000_000));
    assert_eq!(list.num_unmasked(), 3);

    assert!(list.add(3, 867_100_000));
    assert_eq!(list.num_unmasked(), 4);
    assert_eq!(list.band_unmasked(1), 1);
    assert_eq!(list.channel(3).unwrap().band, 1);

    // replacing keeps the counters consistent
    assert!(list.add(3, 867_300_000));
    assert_eq!(list.num_unmasked(), 4);
    assert_eq!(list.band_unmasked(1), 1);

    // zero frequency removes
    assert!(list.add(3, 0));
    assert_eq!(list.num_unmasked(), 3);
    assert_eq!(list.band_unmasked(1), 0);
}

#[test]
fn test_mask_and_unmask() {
    let mut list = eu868();

    assert!(list.mask(0));
    assert_eq!(list.num_unmasked(), 2);
    assert!(list.mask(0));
    assert_eq!(list.num_unmasked(), 2);
    assert_eq!(list.band_unmasked(2), 2);

    list.unmask(0);
    assert_eq!(list.num_unmasked(), 3);
    list.unmask(0);
    assert_eq!(list.num_unmasked(), 3);

    assert!(!list.mask(10));
    list.unmask(10);
    assert_eq!(list.num_unmasked(), 3);
}

#[test]
fn test_remove_masked_channel() {
    let mut list = eu868();

    assert!(list.mask(1));
    list.remove(1);
    assert_eq!(list.num_unmasked(), 2);
    assert_eq!(list.channel(1).unwrap().frequency, 0);

    // removing twice is harmless
    list.remove(1);
    assert_eq!(list.num_unmasked(), 2);

    assert!(list.add(1, 868_300_000));
    assert_eq!(list.num_unmasked(), 3);
    assert!(!list.channel(1).unwrap().masked);
}

#[test]
fn test_masking_the_cursor_moves_it() {
    let mut list = eu868();
    assert_eq!(list.next_channel(), Some(0));

    list.mask(0);
    assert_eq!(list.next_channel(), Some(1));

    list.mask(1);
    list.mask(2);
    assert_eq!(list.next_channel(), None);
    assert_eq!(list.next_band(), None);
    assert_eq!(list.time_ready(), None);
    assert_eq!(list.wait_time(100), 0);

    list.unmask(2);
    assert_eq!(list.next_channel(), Some(2));
}

#[test]
fn test_band_off_time() {
    let mut list = eu868();

    list.register_band_transmission(2, 1_000, 50);
    assert_eq!(list.time_ready(), Some(6_000));
    assert_eq!(list.wait_time(1_000), 5_000);
    assert_eq!(list.wait_time(7_000), 0);

    assert!(list.select(5_999, 0, || 0).is_none());
    assert!(list.select(6_000, 0, || 0).is_some());
}

#[test]
fn test_aggregate_off_time() {
    let mut list = eu868();

    list.set_aggregate_off_time(1_000);
    list.register_band_transmission(2, 0, 10);
    assert_eq!(list.time_ready(), Some(10_000));

    // the band factor wins when it is larger
    list.set_aggregate_off_time(2);
    list.register_band_transmission(2, 0, 10);
    assert_eq!(list.time_ready(), Some(1_000));
}

#[test]
fn test_register_transmission_uses_cursor_band() {
    let mut list = eu868();

    list.register_transmission(0, 20);
    assert_eq!(list.time_ready(), Some(2_000));
}

#[test]
fn test_cursor_round_robin_within_band() {
    let mut list = eu868();
    assert_eq!(list.next_channel(), Some(0));

    list.register_transmission(0, 0);
    assert_eq!(list.next_channel(), Some(1));
    list.register_transmission(0, 0);
    assert_eq!(list.next_channel(), Some(2));
    list.register_transmission(0, 0);
    assert_eq!(list.next_channel(), Some(0));
}

#[test]
fn test_cursor_moves_to_ready_band() {
    let mut list = eu868();
    assert!(list.add(3, 867_100_000));

    list.register_band_transmission(2, 0, 10);
    assert_eq!(list.next_band(), Some(1));
    assert_eq!(list.next_channel(), Some(3));
    assert_eq!(list.time_ready(), Some(0));

    list.register_band_transmission(1, 0, 100);
    assert_eq!(list.next_band(), Some(2));
    assert_eq!(list.time_ready(), Some(1_000));
}

#[test]
fn test_select_honours_rate_bounds() {
    let mut list = eu868();
    assert!(list.constrain_rate(0, 3, 5));

    let ch = list.select(0, 0, || 0).unwrap();
    assert_eq!(ch.index, 1);
    assert_eq!(ch.frequency, 868_300_000);
    assert_eq!(ch.band, 2);

    // (1 << 8 | 1) % 2 == 1
    assert_eq!(list.select(0, 0, || 1).unwrap().index, 2);

    assert_eq!(list.select(0, 4, || 0).unwrap().index, 0);
    assert!(list.select(0, 6, || 0).is_none());
}

#[test]
fn test_select_reaches_every_channel() {
    let list = eu868();
    let mut seen = [false; 3];

    for value in 0..=255u8 {
        let ch = list.select(0, 0, || value).unwrap();
        seen[usize::from(ch.index)] = true;
    }

    assert_eq!(seen, [true; 3]);
}

#[test]
fn test_select_skips_masked_channels() {
    let mut list = eu868();
    list.mask(0);
    list.mask(2);

    for value in [0u8, 1, 2, 200] {
        assert_eq!(list.select(0, 0, || value).unwrap().index, 1);
    }
}

#[test]
fn test_constrain_rate_validation() {
    let mut list = eu868();

    assert!(!list.constrain_rate(0, 4, 3));
    assert!(!list.constrain_rate(0, 0, 7));
    assert!(!list.constrain_rate(5, 0, 5));
    assert!(list.constrain_rate(0, 0, 6));
}

#[test]
fn test_dl_frequency() {
    let mut list = eu868();

    assert!(list.set_dl_frequency(0, 869_100_000));
    assert_eq!(list.channel(0).unwrap().dl_frequency, 869_100_000);
    assert!(!list.set_dl_frequency(7, 869_100_000));
}

#[test]
fn test_restore_defaults() {
    let mut list = eu868();
    list.remove(0);
    list.mask(1);
    list.add(5, 867_500_000);
    list.register_band_transmission(2, 0, 1_000);

    list.restore_defaults();

    assert_eq!(list.num_unmasked(), 3);
    assert_eq!(list.channel(5).unwrap().frequency, 0);
    assert_eq!(list.time_ready(), Some(0));
}

#[test]
fn test_us915_channel_plan() {
    let mut list = ChannelList::new(US915::new());

    assert_eq!(list.capacity(), 72);
    assert_eq!(list.num_unmasked(), 72);
    for band in 0..8 {
        assert_eq!(list.band_unmasked(band), 8);
    }
    assert_eq!(list.band_unmasked(8), 8);

    assert!(list.select(0, 4, || 3).unwrap().index >= 64);
    assert!(list.select(0, 0, || 3).unwrap().index < 64);

    // no duty cycle in US915
    let ch = list.select(0, 0, || 0).unwrap();
    list.register_band_transmission(ch.band, 0, 5_000);
    assert_eq!(list.wait_time(0), 0);
    assert!(list.select(0, 0, || 0).is_some());
}

#[test]
fn test_single_channel_low_duty_band() {
    let mut list = eu868();
    list.remove(0);
    list.remove(1);
    list.remove(2);
    assert_eq!(list.next_channel(), None);

    // 863-865 MHz allows 0.1 %
    assert!(list.add(0, 864_100_000));
    assert_eq!(list.next_channel(), Some(0));
    assert_eq!(list.wait_time(0), 0);

    list.register_transmission(0, 1_500_000);
    assert!(list.wait_time(0) > 0);
    assert_eq!(list.wait_time(0), 1_500_000_000);
    assert!(list.select(0, 0, || 0).is_none());
}
