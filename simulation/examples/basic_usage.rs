/// Basic usage example for the Feels perp simulation framework
///
/// Walks one maker and one taker through a funding interval:
/// - Starting an environment with a deep maker range
/// - Opening a leveraged long
/// - Moving the index below the mark so longs pay
/// - Closing both positions and reading the reports
use feels_perp_core::{AccountId, EngineConfig, Q64};
use feels_perp_simulation::{SimulationResult, TestEnvironment};

const E18: u128 = 1_000_000_000_000_000_000;
const USDC: u64 = 1_000_000;
const LP: AccountId = AccountId(10);
const TRADER: AccountId = AccountId(11);

fn to_f64_price(sqrt_price_x64: u128) -> f64 {
    let sqrt = sqrt_price_x64 as f64 / 2f64.powi(64);
    sqrt * sqrt
}

fn main() -> SimulationResult<()> {
    env_logger::init();

    println!("Feels Perp Simulation - Basic Usage");
    println!("===================================\n");

    println!("1. Starting environment at price 1.0...");
    let config = EngineConfig::default();
    let interval = config.funding_interval_secs;
    let window = config.twap_window_secs;
    let mut env = TestEnvironment::new(config, 1_000, Q64)?;
    env.fund(LP, 100_000 * USDC)?;
    env.fund(TRADER, 1_000 * USDC)?;
    println!("   - Funding interval: {}s, TWAP window: {}s\n", interval, window);

    println!("2. Opening maker range [-6000, 6000]...");
    let maker_id = env.open_maker(LP, -6_000, 6_000, 1_000_000 * E18, 100_000 * USDC)?;
    println!("   - Maker position id: {}\n", maker_id);

    println!("3. Opening 5x long with 100 USDC...");
    let taker_id = env.open_taker(TRADER, true, 100 * USDC, 50_000)?;
    if let Some(taker) = env.position(taker_id).and_then(|p| p.as_taker()) {
        println!("   - Size: {} base, entry value: {} quote", taker.size, taker.entry_value);
    }
    println!("   - Mark after open: {:.6}\n", to_f64_price(env.sqrt_price()?));

    println!("4. Index drops 5% below mark...");
    env.advance(10)?;
    let index_sqrt = (2f64.powi(64) / 1.05f64.sqrt()) as u128;
    env.set_index_price(index_sqrt)?;
    env.advance(window)?;
    env.update_funding()?;
    println!("   - Funding rate per second (Q64.64): {}\n", env.engine.funding_rate());

    println!("5. Closing after one interval...");
    env.advance(interval)?;
    let taker = env.close(TRADER, taker_id)?;
    println!(
        "   - Taker: outcome {:?}, pnl {}, funding {}, payout {}",
        taker.outcome, taker.realized_pnl, taker.funding, taker.payout
    );
    let maker = env.close(LP, maker_id)?;
    println!(
        "   - Maker: outcome {:?}, pnl {}, funding {}, payout {}",
        maker.outcome, maker.realized_pnl, maker.funding, maker.payout
    );
    if let Some(spawned_id) = maker.spawned_taker {
        // The pool could not absorb the maker's leftover base, so its payout now backs a taker
        if let Some(spawned) = env.position(spawned_id).and_then(|p| p.as_taker()) {
            println!(
                "   - Residual {} of {} base carried by taker {} with margin {}",
                if spawned.is_long { "long" } else { "short" },
                spawned.size,
                spawned_id,
                spawned.margin
            );
        }
    }

    println!("\n6. Vault state:");
    println!("   - Total margin: {}", env.engine.total_margin());
    println!("   - Insurance collected: {}", env.engine.insurance_collected());
    println!("   - Bad debt: {}", env.engine.bad_debt());

    Ok(())
}
