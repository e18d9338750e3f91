//! Four-tap Gaussian interpolation.
//!
//! The table holds one Gaussian-shaped kernel sampled at 1/256 steps over
//! four sample periods. For every interpolation fraction the four taps it
//! selects sum to exactly `0x8000`.

/// Interpolation kernel, 512 coefficients in 1.15 fixed point.
#[rustfmt::skip]
pub const GAUSS_TABLE: [i16; 512] = [
    0x002D, 0x002E, 0x002F, 0x0030, 0x0031, 0x0033, 0x0034, 0x0035,
    0x0036, 0x0038, 0x0039, 0x003A, 0x003C, 0x003D, 0x003F, 0x0040,
    0x0042, 0x0043, 0x0045, 0x0047, 0x0048, 0x004A, 0x004C, 0x004E,
    0x004F, 0x0051, 0x0053, 0x0055, 0x0057, 0x0059, 0x005B, 0x005D,
    0x005F, 0x0062, 0x0064, 0x0066, 0x0069, 0x006B, 0x006D, 0x0070,
    0x0072, 0x0075, 0x0078, 0x007A, 0x007D, 0x0080, 0x0083, 0x0086,
    0x0089, 0x008C, 0x008F, 0x0092, 0x0095, 0x0099, 0x009C, 0x009F,
    0x00A3, 0x00A6, 0x00AA, 0x00AE, 0x00B2, 0x00B5, 0x00B9, 0x00BD,
    0x00C2, 0x00C6, 0x00CA, 0x00CE, 0x00D3, 0x00D7, 0x00DC, 0x00E0,
    0x00E5, 0x00EA, 0x00EF, 0x00F4, 0x00F9, 0x00FE, 0x0104, 0x0109,
    0x010F, 0x0114, 0x011A, 0x0120, 0x0126, 0x012C, 0x0132, 0x0138,
    0x013F, 0x0145, 0x014C, 0x0152, 0x0159, 0x0160, 0x0167, 0x016E,
    0x0176, 0x017D, 0x0185, 0x018D, 0x0195, 0x019D, 0x01A5, 0x01AD,
    0x01B5, 0x01BE, 0x01C7, 0x01D0, 0x01D9, 0x01E2, 0x01EB, 0x01F5,
    0x01FE, 0x0208, 0x0212, 0x021C, 0x0226, 0x0231, 0x023B, 0x0246,
    0x0251, 0x025C, 0x0268, 0x0273, 0x027F, 0x028B, 0x0297, 0x02A3,
    0x02B0, 0x02BC, 0x02C9, 0x02D6, 0x02E4, 0x02F1, 0x02FF, 0x030D,
    0x031B, 0x0329, 0x0338, 0x0347, 0x0356, 0x0365, 0x0374, 0x0384,
    0x0394, 0x03A4, 0x03B5, 0x03C5, 0x03D6, 0x03E7, 0x03F9, 0x040A,
    0x041C, 0x042E, 0x0441, 0x0454, 0x0467, 0x047A, 0x048D, 0x04A1,
    0x04B5, 0x04CA, 0x04DE, 0x04F3, 0x0508, 0x051E, 0x0534, 0x054A,
    0x0560, 0x0577, 0x058E, 0x05A5, 0x05BD, 0x05D5, 0x05ED, 0x0606,
    0x061E, 0x0638, 0x0651, 0x066B, 0x0685, 0x06A0, 0x06BB, 0x06D6,
    0x06F2, 0x070E, 0x072A, 0x0747, 0x0764, 0x0781, 0x079F, 0x07BD,
    0x07DB, 0x07FA, 0x0819, 0x0839, 0x0859, 0x0879, 0x089A, 0x08BB,
    0x08DD, 0x08FF, 0x0921, 0x0944, 0x0967, 0x098A, 0x09AE, 0x09D2,
    0x09F7, 0x0A1C, 0x0A42, 0x0A68, 0x0A8E, 0x0AB5, 0x0ADC, 0x0B04,
    0x0B2C, 0x0B55, 0x0B7E, 0x0BA7, 0x0BD1, 0x0BFB, 0x0C26, 0x0C51,
    0x0C7D, 0x0CA9, 0x0CD5, 0x0D02, 0x0D30, 0x0D5E, 0x0D8C, 0x0DBB,
    0x0DEA, 0x0E1A, 0x0E4A, 0x0E7B, 0x0EAC, 0x0EDD, 0x0F0F, 0x0F42,
    0x0F75, 0x0FA9, 0x0FDD, 0x1011, 0x1046, 0x107B, 0x10B1, 0x10E8,
    0x111E, 0x1156, 0x118E, 0x11C6, 0x11FF, 0x1238, 0x1272, 0x12AC,
    0x1322, 0x135E, 0x139A, 0x13D7, 0x1414, 0x1452, 0x1490, 0x14CF,
    0x150E, 0x154D, 0x158E, 0x15CE, 0x160F, 0x1651, 0x1693, 0x16D6,
    0x1719, 0x175C, 0x17A0, 0x17E5, 0x182A, 0x186F, 0x18B5, 0x18FC,
    0x1943, 0x198A, 0x19D2, 0x1A1A, 0x1A63, 0x1AAC, 0x1AF6, 0x1B40,
    0x1B8B, 0x1BD6, 0x1C21, 0x1C6D, 0x1CBA, 0x1D07, 0x1D54, 0x1DA2,
    0x1DF0, 0x1E3F, 0x1E8E, 0x1EDE, 0x1F2E, 0x1F7E, 0x1FCF, 0x2020,
    0x2072, 0x20C4, 0x2117, 0x216A, 0x21BD, 0x2211, 0x2265, 0x22B9,
    0x230E, 0x2363, 0x23B9, 0x240F, 0x2465, 0x24BC, 0x2513, 0x256A,
    0x25C2, 0x261A, 0x2673, 0x26CC, 0x2725, 0x277E, 0x27D8, 0x2832,
    0x288C, 0x28E7, 0x2942, 0x299D, 0x29F8, 0x2A54, 0x2AB0, 0x2B0C,
    0x2B69, 0x2BC6, 0x2C23, 0x2C80, 0x2CDD, 0x2D3B, 0x2D99, 0x2DF7,
    0x2E55, 0x2EB3, 0x2F12, 0x2F71, 0x2FD0, 0x302F, 0x308E, 0x30EE,
    0x314D, 0x31AD, 0x320D, 0x326C, 0x32CC, 0x332C, 0x338D, 0x33ED,
    0x344D, 0x34AD, 0x350E, 0x356E, 0x35CF, 0x362F, 0x368F, 0x36F0,
    0x3750, 0x37B1, 0x3811, 0x3872, 0x38D2, 0x3932, 0x3992, 0x39F3,
    0x3A53, 0x3AB3, 0x3B12, 0x3B72, 0x3BD2, 0x3C31, 0x3C91, 0x3CF0,
    0x3DBD, 0x3E1C, 0x3E7B, 0x3ED9, 0x3F37, 0x3F95, 0x3FF2, 0x404F,
    0x40AC, 0x410A, 0x4165, 0x41C1, 0x421C, 0x4278, 0x42D3, 0x432E,
    0x4387, 0x43E2, 0x443A, 0x4493, 0x44EC, 0x4544, 0x459C, 0x45F4,
    0x464A, 0x46A0, 0x46F6, 0x474B, 0x47A0, 0x47F4, 0x4849, 0x489C,
    0x48EF, 0x4941, 0x4993, 0x49E4, 0x4A35, 0x4A84, 0x4AD4, 0x4B22,
    0x4B71, 0x4BBE, 0x4C0B, 0x4C58, 0x4CA3, 0x4CEE, 0x4D39, 0x4D82,
    0x4DCD, 0x4E14, 0x4E5D, 0x4EA4, 0x4EEA, 0x4F2F, 0x4F74, 0x4FB9,
    0x4FFC, 0x503E, 0x5081, 0x50C1, 0x5102, 0x5142, 0x5181, 0x51BF,
    0x51FE, 0x523A, 0x5276, 0x52B0, 0x52EA, 0x5324, 0x535D, 0x5394,
    0x53CB, 0x5400, 0x5435, 0x546A, 0x549D, 0x54D0, 0x5502, 0x5533,
    0x5563, 0x5592, 0x55C0, 0x55ED, 0x561A, 0x5645, 0x5670, 0x569A,
    0x56C2, 0x56EA, 0x5710, 0x5736, 0x575C, 0x5780, 0x57A2, 0x57C5,
    0x57E6, 0x5806, 0x5826, 0x5844, 0x5861, 0x587D, 0x5899, 0x58B3,
    0x58CC, 0x58E5, 0x58FD, 0x5913, 0x5928, 0x593E, 0x5952, 0x5963,
    0x5975, 0x5985, 0x5995, 0x59A4, 0x59B2, 0x59BE, 0x59CA, 0x59D4,
    0x59DE, 0x59E6, 0x59ED, 0x59F5, 0x59FA, 0x59FF, 0x5A02, 0x5A05,
];

/// Fixed-point gain of the interpolation kernel.
pub const KERNEL_UNITY: i32 = 0x8000;

/// Interpolate between `history[1]` and `history[2]` at `fraction / 256`.
///
/// `history` holds the three previous samples, oldest first; `current` is
/// the sample under the playback position. Each tap is truncated
/// separately.
#[inline]
pub fn interpolate(fraction: usize, history: [i16; 3], current: i16) -> i32 {
    debug_assert!(fraction < 256, "fraction {fraction} out of range");

    let [oldest, older, old] = history;
    let tap = |index: usize, sample: i16| {
        (i32::from(GAUSS_TABLE[index]) * i32::from(sample)) >> 15
    };

    tap(0x0FF - fraction, oldest)
        + tap(0x1FF - fraction, older)
        + tap(0x100 + fraction, old)
        + tap(fraction, current)
}

/// The four coefficients used at `fraction`, in tap order.
pub fn taps(fraction: usize) -> [i16; 4] {
    [
        GAUSS_TABLE[0x0FF - fraction],
        GAUSS_TABLE[0x1FF - fraction],
        GAUSS_TABLE[0x100 + fraction],
        GAUSS_TABLE[fraction],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_taps_sum_to_unity() {
        for fraction in 0..256 {
            let sum: i32 = taps(fraction).iter().map(|&c| i32::from(c)).sum();
            assert_eq!(sum, KERNEL_UNITY, "fraction {fraction}");
        }
    }

    #[test]
    fn test_kernel_peaks_at_center() {
        let peak = GAUSS_TABLE.iter().copied().max().unwrap_or_default();
        assert_eq!(GAUSS_TABLE[0x1FF], peak);
        assert!(GAUSS_TABLE.iter().all(|&c| c > 0));
    }

    #[test]
    fn test_silence_stays_silent() {
        for fraction in 0..256 {
            assert_eq!(interpolate(fraction, [0; 3], 0), 0);
        }
    }

    #[test]
    fn test_fraction_zero_favours_older_sample() {
        let value = interpolate(0, [0, 10_000, 0], 0);
        assert!(value > 7_000, "got {value}");
    }

    proptest! {
        #[test]
        fn prop_constant_input_keeps_level(level in -0x7FFFi16..=0x7FFF, fraction in 0usize..256) {
            let value = interpolate(fraction, [level; 3], level);
            let level = i32::from(level);
            prop_assert!(value <= level && value >= level - 3, "{} -> {}", level, value);
        }
    }
}
