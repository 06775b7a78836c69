//! Wager bot - plays real rounds against a house through the wager adapter
//!
//! Usage:
//!   cargo run --release --bin arcade-bot -- --wallet <WALLET> [OPTIONS]
//!
//! Options:
//!   -u, --url        House URL (default: http://localhost:8080)
//!   -w, --wallet     Wallet address to play with (required)
//!   -g, --game       peg_board, multiplier_target or card_streak (default: peg_board)
//!   -r, --rounds     Rounds to play (default: 10)
//!   -b, --bet        Bet amount per round (default: 1)
//!       --deposit    Record a deposit of this amount first (development houses only)

use anyhow::{Context, Result};
use arcade_client::{AdapterEvent, Client, WagerAdapter};
use arcade_execution::{cards, Arcade, Mode, Phase};
use arcade_types::{
    DepositRequest, GameKind, GameParams, Guess, RoundView, StreakStatus, Token, WalletAddress,
};
use clap::Parser;
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Tick period of the local round loop.
const TICK: Duration = Duration::from_millis(16);

#[derive(Parser, Debug)]
#[command(author, version, about = "Plays wager rounds against an arcade house")]
struct Args {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[arg(short, long)]
    wallet: String,

    #[arg(short, long, default_value = "MIL")]
    token: String,

    #[arg(short, long, default_value = "peg_board")]
    game: String,

    #[arg(short, long, default_value = "10")]
    rounds: usize,

    #[arg(short, long, default_value = "1")]
    bet: String,

    /// Peg board rows (8, 12 or 16).
    #[arg(long)]
    rows: Option<u8>,

    /// Multiplier target, e.g. 2.50.
    #[arg(long)]
    target: Option<String>,

    /// Correct card guesses before cashing out.
    #[arg(long, default_value = "2")]
    streak: u8,

    #[arg(long)]
    deposit: Option<String>,

    /// Per-call timeout in milliseconds.
    #[arg(long, default_value = "10000")]
    timeout_ms: u64,
}

fn build_params(args: &Args, game: GameKind) -> Result<GameParams> {
    Ok(match game {
        GameKind::PegBoard => GameParams::rows(args.rows.unwrap_or(8)),
        GameKind::MultiplierTarget => {
            let target = args.target.as_deref().unwrap_or("2.00");
            GameParams::target(target.parse().with_context(|| format!("invalid target: {target}"))?)
        }
        GameKind::CardStreak => GameParams::default(),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let wallet = WalletAddress::parse(&args.wallet).context("invalid wallet")?;
    let token = Token::parse(&args.token).context("invalid token")?;
    let game: GameKind = args.game.parse().context("invalid game")?;
    let bet: Decimal = args.bet.parse().context("invalid bet")?;
    let params = build_params(&args, game)?;

    let client = Client::new(&args.url)?;
    if !client.healthz().await? {
        anyhow::bail!("house at {} is not healthy", args.url);
    }

    if let Some(amount) = args.deposit.as_deref() {
        let amount: Decimal = amount.parse().context("invalid deposit")?;
        let response = client
            .record_deposit(&DepositRequest {
                wallet: wallet.clone(),
                tx_id: format!("bot-{}", Uuid::new_v4()),
                token: token.clone(),
                amount,
                chain: "dev".to_string(),
            })
            .await?;
        info!(balance = %response.balance, "deposit recorded");
    }

    let mut arcade = Arcade::new(token);
    let instance = arcade.open(game, Mode::Real);
    instance.set_bet_amount(bet)?;
    instance.set_params(params)?;

    let mut adapter = WagerAdapter::new(client, wallet)
        .with_timeout(Duration::from_millis(args.timeout_ms));
    let mut interval = tokio::time::interval(TICK);
    let mut placed = 0usize;
    let mut settled = 0usize;
    let mut wagered = Decimal::ZERO;
    let mut paid = Decimal::ZERO;

    'rounds: while settled < args.rounds {
        interval.tick().await;

        for event in adapter.poll(&mut arcade) {
            match event {
                AdapterEvent::BetAuthorized { game } => {
                    placed += 1;
                    wagered += bet;
                    if let Some(instance) = arcade.get_mut(game) {
                        instance.start()?;
                    }
                }
                AdapterEvent::BetFailed { error, .. } if error.is_insufficient_balance() => {
                    warn!("out of funds");
                    break 'rounds;
                }
                AdapterEvent::Settled { response, .. } => {
                    settled += 1;
                    paid += response.payout;
                    info!(
                        round = settled,
                        payout = %response.payout,
                        settlement = response.settlement.as_str(),
                        balance = %response.balance,
                        "round settled"
                    );
                }
                AdapterEvent::BetFailed { error, .. }
                | AdapterEvent::GuessFailed { error, .. }
                | AdapterEvent::ReportFailed { error, .. }
                | AdapterEvent::BalanceFailed { error, .. } => {
                    warn!(%error, "call failed");
                }
                _ => {}
            }
        }
        arcade.tick_all();

        let Some(instance) = arcade.get_mut(game) else {
            break;
        };
        let quiet = !instance.is_bet_in_flight()
            && !instance.is_guess_in_flight()
            && !instance.is_report_in_flight();
        match instance.phase() {
            Phase::Idle if quiet && !instance.needs_balance_refresh() && placed < args.rounds => {
                adapter.place_bet(&mut arcade, game)?;
            }
            Phase::Resolving if quiet && game == GameKind::CardStreak => {
                let Some(RoundView::CardStreak(view)) = instance.round_view() else {
                    continue;
                };
                if view.status != StreakStatus::Playing {
                    continue;
                }
                if view.streak >= args.streak {
                    instance.cash_out()?;
                } else if let Some(card) = view.current() {
                    let guess = if cards::rank(card) <= 7 {
                        Guess::Higher
                    } else {
                        Guess::Lower
                    };
                    adapter.guess(&mut arcade, game, guess)?;
                }
            }
            _ => {}
        }
    }

    info!(placed, settled, %wagered, %paid, "bot finished");
    Ok(())
}
