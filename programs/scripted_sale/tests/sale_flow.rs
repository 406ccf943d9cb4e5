use anchor_lang::prelude::*;

use scripted_sale::host::{quote, sale_table, HolderCounters, SaleView, StorageSlot, CONTEXT_LEN};
use scripted_sale::state::{
    commitment_hash, Commitment, Currency, HolderLedger, RevealPhase, Sale, SaleConfig, Shuffle,
    TimeBound,
};
use scripted_sale::vm::{validate, DispatchTable, ScriptBuilder, Word};
use scripted_sale::{quote_for, reservation_cost, settle, MintRequest, SaleError, SaleQuote};

/// Tiered pricing: 100 per unit while fewer than 5 units are minted,
/// 150 afterwards. Each wallet may hold at most 4.
fn tiered_sale(table: &DispatchTable<SaleView>) -> Sale {
    let mut b = ScriptBuilder::new(table);
    b.constant(Word::from(4u64))
        .context(0)
        .op("number_minted", 0)
        .op("saturating_sub", 2)
        .op("storage", StorageSlot::TotalMinted as u16)
        .constant(Word::from(5u64))
        .op("less_than", 0)
        .constant(Word::from(100u64))
        .constant(Word::from(150u64))
        .op("eager_if", 0);
    let script = b.build().unwrap();
    let info = validate(table, &script, CONTEXT_LEN).unwrap();

    let mut sale = Sale::default();
    sale.configure(
        Pubkey::new_unique(),
        7,
        SaleConfig {
            script,
            supply_limit: 12,
            max_per_wallet: 0,
            currency: Currency::Native,
            recipient: Pubkey::new_unique(),
            delegated_minter: None,
            royalty_bps: 250,
            royalty_recipient: Pubkey::new_unique(),
        },
        info,
        table.fingerprint(),
        254,
    )
    .unwrap();
    sale
}

fn buy(
    table: &DispatchTable<SaleView>,
    sale: &mut Sale,
    ledger: &mut HolderLedger,
    request: MintRequest,
) -> Result<(u64, u64)> {
    let view = SaleView::new(sale, Some(HolderCounters::from(&*ledger)), 1_000);
    let q = SaleQuote::from_quote(quote(
        table,
        sale,
        &view,
        &ledger.holder,
        request.desired_units,
    )?)?;
    let units = settle(
        &request,
        q,
        sale.available(),
        sale.wallet_remaining(ledger.minted),
    )?;
    let cost = units * q.price;
    sale.record_mint(units, cost)?;
    ledger.record_mint(units)?;
    Ok((units, cost))
}

fn ledger_for(sale: Pubkey) -> HolderLedger {
    let mut ledger = HolderLedger::default();
    ledger.bind(sale, Pubkey::new_unique(), 255);
    ledger
}

#[test]
fn purchases_follow_the_script() {
    let table = sale_table().unwrap();
    let mut sale = tiered_sale(&table);
    let sale_key = Pubkey::new_unique();
    let mut alice = ledger_for(sale_key);
    let mut bob = ledger_for(sale_key);

    let request = MintRequest {
        desired_units: 10,
        minimum_units: 1,
        maximum_price: 100,
    };
    // Script caps alice at 4 per wallet.
    assert_eq!(buy(&table, &mut sale, &mut alice, request).unwrap(), (4, 400));
    let any_amount = MintRequest {
        minimum_units: 0,
        ..request
    };
    assert_eq!(
        buy(&table, &mut sale, &mut alice, any_amount).unwrap_err(),
        SaleError::NoUnitsAvailable.into()
    );

    let single = MintRequest {
        desired_units: 1,
        ..request
    };
    assert_eq!(buy(&table, &mut sale, &mut bob, single).unwrap(), (1, 100));

    // Five minted: second tier now applies.
    assert_eq!(
        buy(&table, &mut sale, &mut bob, request).unwrap_err(),
        SaleError::PriceAboveMaximum.into()
    );
    let accept_tier_two = MintRequest {
        maximum_price: 150,
        ..request
    };
    assert_eq!(
        buy(&table, &mut sale, &mut bob, accept_tier_two).unwrap(),
        (3, 450)
    );

    assert_eq!(sale.total_minted, 8);
    assert_eq!(sale.amount_payable(), 950);
    assert_eq!(sale.available(), 4);
}

#[test]
fn reservations_shuffle_and_claim() {
    let table = sale_table().unwrap();
    let mut sale = tiered_sale(&table);
    let mut shuffle = Shuffle::default();

    // Fresh buyers have no ledger. The script's per-wallet cap of 4 still
    // applies to them.
    let over_cap = quote_for(&sale, Pubkey::new_unique(), None, 5, 0).unwrap();
    assert_eq!(over_cap, SaleQuote { max_units: 4, price: 100 });
    assert_eq!(
        reservation_cost(5, 100, over_cap).unwrap_err(),
        SaleError::MaxLimit.into()
    );

    let secrets = [[1u8; 32], [2u8; 32], [3u8; 32]];
    let mut commitments: Vec<Commitment> = Vec::new();
    for secret in secrets.iter() {
        let buyer = Pubkey::new_unique();
        let q = quote_for(&sale, buyer, None, 4, 0).unwrap();
        let cost = reservation_cost(4, 100, q).unwrap();
        let mut c = Commitment::default();
        shuffle
            .commit(&mut sale, &mut c, commitment_hash(secret), 4, 0)
            .unwrap();
        sale.record_payment(cost).unwrap();
        commitments.push(c);
    }
    assert_eq!(shuffle.phase, RevealPhase::Reserved);
    assert_eq!(sale.available(), 0);
    assert_eq!(sale.amount_paid, 1_200);

    shuffle
        .start_reveal(
            [0xAB; 32],
            TimeBound {
                base_duration: 600,
                max_extra_time: 120,
            },
            10,
        )
        .unwrap();
    for (c, secret) in commitments.iter_mut().zip(secrets.iter()) {
        shuffle.reveal(c, secret, 20).unwrap();
    }
    assert_eq!(shuffle.phase, RevealPhase::Revealed);

    assert_eq!(shuffle.reveal_ids(&mut sale, 30).unwrap(), 0);

    let mut assigned: Vec<u32> = Vec::new();
    for c in commitments.iter_mut() {
        let ids = shuffle.claim(c).unwrap();
        assert_eq!(ids.len() as u64, c.units);
        sale.record_claim(c.units).unwrap();
        assigned.extend(ids);
    }
    assigned.sort_unstable();
    assert_eq!(assigned, (1..=12).collect::<Vec<u32>>());
    assert_eq!(sale.total_minted, 12);
}
