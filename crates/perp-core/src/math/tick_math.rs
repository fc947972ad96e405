//! # Tick Math
//!
//! Conversions between ticks and Q64.64 sqrt prices. A tick `i` corresponds to the
//! price `1.0001^i`; the sqrt price is computed by binary decomposition of the tick.

use ethnum::U256;

use crate::constants::{MAX_SQRT_PRICE_X64, MAX_TICK, MIN_SQRT_PRICE_X64, MIN_TICK};
use crate::errors::{PerpError, PerpResult};

/// Get the Q64.64 sqrt price at a tick
pub fn sqrt_price_at_tick(tick: i32) -> PerpResult<u128> {
    if !is_tick_valid(tick) {
        return Err(PerpError::InvalidTick(tick));
    }
    if tick >= 0 {
        Ok(sqrt_price_positive_tick(tick))
    } else {
        Ok(sqrt_price_negative_tick(tick))
    }
}

/// Get the greatest tick whose sqrt price is at or below `sqrt_price`
pub fn tick_at_sqrt_price(sqrt_price: u128) -> PerpResult<i32> {
    if !is_sqrt_price_valid(sqrt_price) {
        return Err(PerpError::InvalidSqrtPrice(sqrt_price));
    }

    // Binary search over the monotonic tick -> sqrt price mapping
    let mut low = MIN_TICK;
    let mut high = MAX_TICK;
    while low < high {
        let mid = low + (high - low + 1) / 2;
        if sqrt_price_at_tick(mid)? <= sqrt_price {
            low = mid;
        } else {
            high = mid - 1;
        }
    }
    Ok(low)
}

/// Check if a tick is within the supported range
pub fn is_tick_valid(tick: i32) -> bool {
    (MIN_TICK..=MAX_TICK).contains(&tick)
}

/// Check if a Q64.64 sqrt price is within the supported range
pub fn is_sqrt_price_valid(sqrt_price: u128) -> bool {
    (MIN_SQRT_PRICE_X64..=MAX_SQRT_PRICE_X64).contains(&sqrt_price)
}

fn sqrt_price_positive_tick(tick: i32) -> u128 {
    // Q96 intermediate, shifted down to Q64 at the end
    let mut ratio: u128 = if tick & 1 != 0 {
        79232123823359799118286999567
    } else {
        79228162514264337593543950336
    };

    const MAGIC: [(i32, u128); 18] = [
        (2, 79236085330515764027303304731),
        (4, 79244008939048815603706035061),
        (8, 79259858533276714757314932305),
        (16, 79291567232598584799939703904),
        (32, 79355022692464371645785046466),
        (64, 79482085999252804386437311141),
        (128, 79736823300114093921829183326),
        (256, 80248749790819932309965073892),
        (512, 81282483887344747381513967011),
        (1024, 83390072131320151908154831281),
        (2048, 87770609709833776024991924138),
        (4096, 97234110755111693312479820773),
        (8192, 119332217159966728226237229890),
        (16384, 179736315981702064433883588727),
        (32768, 407748233172238350107850275304),
        (65536, 2098478828474011932436660412517),
        (131072, 55581415166113811149459800483533),
        (262144, 38992368544603139932233054999993551),
    ];

    for (bit, factor) in MAGIC {
        if tick & bit != 0 {
            ratio = mul_shift_96(ratio, factor);
        }
    }

    ratio >> 32
}

fn sqrt_price_negative_tick(tick: i32) -> u128 {
    let abs_tick = tick.abs();

    let mut ratio: u128 = if abs_tick & 1 != 0 {
        18445821805675392311
    } else {
        18446744073709551616
    };

    const MAGIC: [(i32, u128); 18] = [
        (2, 18444899583751176498),
        (4, 18443055278223354162),
        (8, 18439367220385604838),
        (16, 18431993317065449817),
        (32, 18417254355718160513),
        (64, 18387811781193591352),
        (128, 18329067761203520168),
        (256, 18212142134806087854),
        (512, 17980523815641551639),
        (1024, 17526086738831147013),
        (2048, 16651378430235024244),
        (4096, 15030750278693429944),
        (8192, 12247334978882834399),
        (16384, 8131365268884726200),
        (32768, 3584323654723342297),
        (65536, 696457651847595233),
        (131072, 26294789957452057),
        (262144, 37481735321082),
    ];

    for (bit, factor) in MAGIC {
        if abs_tick & bit != 0 {
            ratio = (ratio * factor) >> 64;
        }
    }

    ratio
}

fn mul_shift_96(n0: u128, n1: u128) -> u128 {
    let product: U256 = (U256::from(n0) * U256::from(n1)) >> 96;
    product.as_u128()
}
