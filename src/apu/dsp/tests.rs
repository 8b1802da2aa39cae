use super::tables::GAUSSIAN;
use super::voice::Voice;

#[test]
fn gaussian_kernel_matches_hardware_end_points() {
    assert_eq!(GAUSSIAN[..16], [0; 16]);
    assert_eq!(GAUSSIAN[16], 1);
    assert_eq!((GAUSSIAN[255], GAUSSIAN[256]), (370, 374));
    assert_eq!((GAUSSIAN[510], GAUSSIAN[511]), (0x519, 0x519));
    assert!(GAUSSIAN.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[test]
fn gaussian_tap_groups_sum_to_unity_gain() {
    for offset in 0..256 {
        let sum: i32 = [255 - offset, 511 - offset, 256 + offset, offset]
            .iter()
            .map(|&index| GAUSSIAN[index] as i32)
            .sum();
        assert!((2047..=2049).contains(&sum), "offset {offset}: {sum}");
    }
}

#[test]
fn interpolation_of_flat_input_keeps_level() {
    let mut voice = Voice::default();
    voice.buffer = [0x2000; 19];
    // 370 + 1305 + 374 + 0 = 2049 at fractional position 0.
    assert_eq!(voice.interpolate(), 0x2004);

    voice.position = 0x80 << 4;
    let out = voice.interpolate();
    assert!((0x1FFC..=0x2004).contains(&out), "{out:#X}");
    assert_eq!(out & 1, 0);
}
