//! Volume scale conversion
//!
//! HFP carries speaker gain on a 0..=15 scale; the device uses 0..=N where N is
//! [`HfpConfig::max_volume_level`](crate::config::HfpConfig::max_volume_level).
//! Any non-zero level stays non-zero in both directions.

/// Highest level of the HFP gain scale
pub const HFP_MAX_VOLUME: u32 = 15;

// Widened so any u32 device scale is safe
fn div_round(numerator: u64, denominator: u64) -> u64 {
    (2 * numerator + denominator) / (2 * denominator)
}

/// Device level (0..=max_level) to HFP gain (0..=15)
pub fn device_to_hfp(device_vol: u32, max_level: u32) -> u8 {
    if device_vol == 0 || max_level == 0 {
        return 0;
    }
    let device_vol = device_vol.min(max_level);
    let hfp = div_round(
        u64::from(device_vol) * u64::from(HFP_MAX_VOLUME),
        u64::from(max_level),
    )
    .clamp(1, u64::from(HFP_MAX_VOLUME));
    hfp as u8
}

/// HFP gain (0..=15) to device level (0..=max_level)
pub fn hfp_to_device(hfp_vol: u8, max_level: u32) -> u32 {
    let hfp_vol = u32::from(hfp_vol);
    if hfp_vol == 0 {
        return 0;
    }
    if hfp_vol >= HFP_MAX_VOLUME {
        return max_level;
    }
    let device = div_round(
        u64::from(hfp_vol + 1) * u64::from(max_level),
        u64::from(HFP_MAX_VOLUME + 1),
    )
    .clamp(1, u64::from(max_level.max(1)));
    // Bounded by max_level above
    device as u32
}
