//! Maker funding along a price path that leaves the range on both sides.

use approx::assert_relative_eq;
use feels_perp_core::math::{get_amounts_for_liquidity, sqrt_price_at_tick, Rounding};
use feels_perp_core::{
    AccountId, AmmVenue, CloseOutcome, EngineConfig, PerpError, Position, VenueError,
};
use feels_perp_simulation::{SimulationError, TestEnvironment};

const E18: u128 = 1_000_000_000_000_000_000;
const LP: AccountId = AccountId(10);
const MAKER: AccountId = AccountId(11);
const TRADER: AccountId = AccountId(12);

const MAKER_LOWER: i32 = -600;
const MAKER_UPPER: i32 = 600;
const MAKER_LIQUIDITY: u128 = 1_000 * E18;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn sqrt_x64(price: f64) -> u128 {
    (price.sqrt() * 2f64.powi(64)) as u128
}

fn current_tick(env: &TestEnvironment) -> i32 {
    env.engine.venue().sqrt_price_and_tick().unwrap().1
}

/// Integrates `rate * base held` between operations
struct FundingTrace {
    rate: i128,
    sqrt_price: u128,
    since: u32,
    integral: f64,
}

impl FundingTrace {
    fn start(env: &TestEnvironment) -> Self {
        Self {
            rate: env.engine.funding_rate(),
            sqrt_price: env.sqrt_price().unwrap(),
            since: env.now(),
            integral: 0.0,
        }
    }

    /// Accrue up to now with the state recorded at the last checkpoint, then
    /// record the current state
    fn checkpoint(&mut self, env: &TestEnvironment) {
        let (base, _) = get_amounts_for_liquidity(
            self.sqrt_price,
            sqrt_price_at_tick(MAKER_LOWER).unwrap(),
            sqrt_price_at_tick(MAKER_UPPER).unwrap(),
            MAKER_LIQUIDITY,
            Rounding::Down,
        )
        .unwrap();
        let elapsed = (env.now() - self.since) as f64;
        self.integral += self.rate as f64 * elapsed * base as f64 / 2f64.powi(64);

        self.rate = env.engine.funding_rate();
        self.sqrt_price = env.sqrt_price().unwrap();
        self.since = env.now();
    }
}

fn market_with_maker() -> (TestEnvironment, u64) {
    // Index 10% below the starting mark so makers holding base pay
    let mut env = TestEnvironment::new(EngineConfig::default(), 1_000, sqrt_x64(0.9)).unwrap();
    env.fund(LP, 10_000_000_000).unwrap();
    env.fund(MAKER, 100_000_000).unwrap();
    env.fund(TRADER, 1_000_000_000).unwrap();

    env.open_maker(LP, -12_000, 12_000, 10_000 * E18, 2_000_000_000).unwrap();
    let maker_id = env
        .open_maker(MAKER, MAKER_LOWER, MAKER_UPPER, MAKER_LIQUIDITY, 10_000_000)
        .unwrap();
    (env, maker_id)
}

#[test]
fn test_maker_funding_matches_integrated_holding() {
    init_logging();
    let (mut env, maker_id) = market_with_maker();
    let mut trace = FundingTrace::start(&env);
    let growth_at_entry = env.engine.maker_range_growth(maker_id).unwrap();

    // Inside the range, then pushed above it
    env.advance(3_600).unwrap();
    let long_id = env.open_taker(TRADER, true, 100_000_000, 50_000).unwrap();
    trace.checkpoint(&env);
    assert!(current_tick(&env) > MAKER_UPPER);
    let growth_after_crossing = env.engine.maker_range_growth(maker_id).unwrap();
    assert_ne!(growth_after_crossing.inside, growth_at_entry.inside);

    // Above the range nothing accrues inside or below
    env.advance(1_800).unwrap();
    env.update_funding().unwrap();
    trace.checkpoint(&env);
    let growth_above = env.engine.maker_range_growth(maker_id).unwrap();
    assert_eq!(growth_above.inside, growth_after_crossing.inside);
    assert_eq!(growth_above.inside_scaled, growth_after_crossing.inside_scaled);
    assert_eq!(growth_above.below_lower, growth_after_crossing.below_lower);

    // Back inside
    env.advance(1_800).unwrap();
    env.close(TRADER, long_id).unwrap();
    trace.checkpoint(&env);
    let tick = current_tick(&env);
    assert!(MAKER_LOWER <= tick && tick < MAKER_UPPER);

    // Pushed below the range
    env.advance(3_600).unwrap();
    env.open_taker(TRADER, false, 100_000_000, 50_000).unwrap();
    trace.checkpoint(&env);
    assert!(current_tick(&env) < MAKER_LOWER);

    env.advance(3_600).unwrap();
    trace.checkpoint(&env);
    let balance_before = env.balance(MAKER);
    let report = env.close(MAKER, maker_id).unwrap();

    assert!(report.funding > 0);
    assert_relative_eq!(report.funding as f64, trace.integral, max_relative = 1e-6);
    assert_eq!(report.outcome, CloseOutcome::Paid);
    assert_eq!(report.spawned_taker, None);
    assert_eq!(env.balance(MAKER), balance_before + report.payout);

    // Both maker ticks went inactive and left the mirror
    assert!(!env.engine.ledger().is_bucket_initialized(MAKER_LOWER));
    assert!(!env.engine.ledger().is_bucket_initialized(MAKER_UPPER));
}

#[test]
fn test_unsettleable_base_becomes_taker() {
    init_logging();
    let mut env = TestEnvironment::new(EngineConfig::default(), 1_000, sqrt_x64(1.0)).unwrap();
    env.fund(MAKER, 100_000_000).unwrap();
    env.fund(TRADER, 10_000_000).unwrap();

    // The maker is the only liquidity, so nothing can absorb its base after the burn
    let maker_id = env
        .open_maker(MAKER, MAKER_LOWER, MAKER_UPPER, MAKER_LIQUIDITY, 10_000_000)
        .unwrap();
    env.advance(60).unwrap();
    env.open_taker(TRADER, true, 1_000_000, 50_000).unwrap();

    env.advance(60).unwrap();
    let balance_before = env.balance(MAKER);
    let report = env.close(MAKER, maker_id).unwrap();

    assert_eq!(report.outcome, CloseOutcome::Paid);
    assert_eq!(report.payout, 0);
    assert_eq!(env.balance(MAKER), balance_before);

    let taker_id = report.spawned_taker.expect("residual base converted");
    let taker = match env.position(taker_id) {
        Some(Position::Taker(taker)) => taker.clone(),
        other => panic!("expected taker, got {:?}", other),
    };
    assert_eq!(taker.holder, MAKER);
    // Price rose, so the maker returned less base than it borrowed
    assert!(!taker.is_long);
    assert!(taker.size > 0);
    assert!(taker.margin > 9_000_000 && taker.margin <= 10_000_000);

    // Closing the spawned taker needs the same missing liquidity and reverts whole
    let err = env.close(MAKER, taker_id).unwrap_err();
    assert_eq!(err, SimulationError::Engine(PerpError::Venue(VenueError::InsufficientLiquidity)));
    assert!(env.position(taker_id).is_some());
}
