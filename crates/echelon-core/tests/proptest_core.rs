//! Property-based tests for the echelon core.
//!
//! Uses proptest to generate random stock operations, component levels,
//! sales and small supply chains, then verify the accounting invariants.

use echelon_core::id::Quantity;
use echelon_core::metrics::{EventKind, NullSink, PeriodContext};
use echelon_core::node::Node;
use echelon_core::sim::RunConfig;
use echelon_core::stock::{Stock, StockError};
use echelon_core::test_utils::*;
use proptest::prelude::*;
use std::collections::VecDeque;

// ===========================================================================
// Generators
// ===========================================================================

#[derive(Debug, Clone)]
enum StockOp {
    Add(Quantity),
    Consume(Quantity),
}

fn arb_stock_ops(max_ops: usize) -> impl Strategy<Value = Vec<StockOp>> {
    proptest::collection::vec(
        prop_oneof![
            (0..20u64).prop_map(StockOp::Add),
            (0..30u64).prop_map(StockOp::Consume),
        ],
        1..=max_ops,
    )
}

fn arb_sales(periods: usize) -> impl Strategy<Value = Vec<Vec<Quantity>>> {
    proptest::collection::vec(proptest::collection::vec(1..6u64, 0..4), periods)
}

/// Assembly node "A" with up to three components, each consumed 1..=4 per unit.
fn assembly_node(numbers: &[Quantity]) -> Node {
    let names = ["P0", "P1", "P2"];
    let predecessors: Vec<(&str, Quantity)> = names.iter().copied().zip(numbers.iter().copied()).collect();
    node("A", &predecessors, &[])
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// FIFO: stock matches a reference deque model after every operation,
    /// and an over-consume fails without touching anything.
    #[test]
    fn stock_matches_fifo_model(ops in arb_stock_ops(60)) {
        let mut stock = Stock::new();
        let mut model: VecDeque<(Quantity, Option<u64>)> = VecDeque::new();

        for (step, op) in ops.into_iter().enumerate() {
            let tag = Some(step as u64);
            match op {
                StockOp::Add(q) => {
                    stock.add("x", q, tag).unwrap();
                    if q > 0 {
                        model.push_back((q, tag));
                    }
                }
                StockOp::Consume(q) => {
                    let total: Quantity = model.iter().map(|(q, _)| q).sum();
                    let result = stock.consume("x", q);
                    if q > total {
                        let is_insufficient = matches!(result, Err(StockError::InsufficientStock { .. }));
                        prop_assert!(is_insufficient);
                    } else {
                        prop_assert!(result.is_ok());
                        let mut left = q;
                        while left > 0 {
                            let Some(front) = model.front_mut() else { break };
                            if front.0 <= left {
                                left -= front.0;
                                model.pop_front();
                            } else {
                                front.0 -= left;
                                left = 0;
                            }
                        }
                    }
                }
            }

            let batches: Vec<(Quantity, Option<u64>)> =
                stock.batches("x").map(|b| (b.quantity, b.period)).collect();
            prop_assert_eq!(&batches, &model.iter().copied().collect::<Vec<_>>());
            prop_assert_eq!(stock.get("x"), model.iter().map(|(q, _)| q).sum::<Quantity>());
            prop_assert!(stock.is_consistent());
        }
    }

    /// Consume then add restores the total even though the batch layout may differ.
    #[test]
    fn consume_then_add_restores_total(adds in proptest::collection::vec(1..10u64, 1..6), take in 0..10u64) {
        let mut stock = Stock::new();
        for &q in &adds {
            stock.add("x", q, None).unwrap();
        }
        let before = stock.get("x");
        let take = take.min(before);
        stock.consume("x", take).unwrap();
        stock.add("x", take, None).unwrap();
        prop_assert_eq!(stock.get("x"), before);
    }

    /// Increasing any component level never lowers the feasible assembly count.
    #[test]
    fn assemblies_feasible_is_monotonic(
        numbers in proptest::collection::vec(1..=4u64, 1..=3),
        levels in proptest::collection::vec(0..40u64, 3),
        which in 0..3usize,
        extra in 0..20u64,
    ) {
        let mut a = assembly_node(&numbers);
        for (i, level) in levels.iter().take(numbers.len()).enumerate() {
            a.stock_mut().add(&format!("P{i}"), *level, None).unwrap();
        }
        let before = a.assemblies_feasible();

        let which = which % numbers.len();
        a.stock_mut().add(&format!("P{which}"), extra, None).unwrap();
        prop_assert!(a.assemblies_feasible() >= before);

        // Assembling consumes exactly `feasible * number` of each component.
        let feasible = a.assemblies_feasible();
        let components: Vec<Quantity> = (0..numbers.len()).map(|i| a.stock().get(&format!("P{i}"))).collect();
        let ctx = PeriodContext::new(1, 1).for_node(a.id());
        a.assemble(&ctx, &mut NullSink).unwrap();
        prop_assert_eq!(a.own_stock(), feasible);
        for (i, number) in numbers.iter().enumerate() {
            prop_assert_eq!(a.stock().get(&format!("P{i}")), components[i] - feasible * number);
        }
    }

    /// Satisfied plus backordered equals requested, every time.
    #[test]
    fn sales_conservation(lines in proptest::collection::vec(1..10u64, 0..6), on_hand in 0..40u64) {
        let mut r = with_stock(make_node("R", 1, vec![lines.clone()], &[], &[]), on_hand);
        let ctx = PeriodContext::new(1, 1).for_node(r.id());
        let outcome = r.satisfy_sales(&ctx, &mut NullSink).unwrap();

        let requested: Quantity = lines.iter().sum();
        prop_assert_eq!(outcome.requested, requested);
        prop_assert_eq!(outcome.satisfied + outcome.backordered, requested);
        prop_assert_eq!(outcome.satisfied, on_hand.min(requested));
        prop_assert!(outcome.lines_satisfied <= outcome.lines);
        prop_assert_eq!(r.backorders().quantity(), outcome.backordered);
        prop_assert_eq!(r.own_stock(), on_hand - outcome.satisfied);
    }

    /// Backorders shrink by exactly min(stock, backorders).
    #[test]
    fn backorders_clear_up_to_stock(owed in 1..30u64, on_hand in 0..40u64) {
        let mut r = with_stock(supplier("R"), on_hand);
        r.backorders_mut().add(owed, 1).unwrap();
        let ctx = PeriodContext::new(2, 1).for_node(r.id());
        let shipped = r.satisfy_backorders(&ctx, &mut NullSink).unwrap();
        prop_assert_eq!(shipped, on_hand.min(owed));
        prop_assert_eq!(r.backorders().quantity(), owed - shipped);
    }

    /// Identical scenarios produce identical event sequences and final state.
    #[test]
    fn runs_are_deterministic(
        sales in arb_sales(5),
        stock in 0..10u64,
        level in 0..15u64,
        loops in 1..3u32,
    ) {
        let config = RunConfig::new(loops, 5).with_snapshots(true);
        let mut a = base_stock_simulator(two_echelon(sales.clone(), stock, level), config.clone());
        let mut b = base_stock_simulator(two_echelon(sales, stock, level), config);
        let summary_a = a.run().unwrap();
        let summary_b = b.run().unwrap();
        prop_assert_eq!(summary_a, summary_b);
        prop_assert_eq!(a.sink(), b.sink());

        for node in a.chain().nodes() {
            prop_assert!(node.stock().is_consistent());
        }
        let requested: Quantity = a.sink().iter().filter(|e| e.event == EventKind::Sales).map(|e| e.quantity).sum();
        let satisfied: Quantity = a.sink().iter().filter(|e| e.event == EventKind::SalesSatisfied).map(|e| e.quantity).sum();
        let backordered: Quantity = a.sink().iter().filter(|e| e.event == EventKind::SalesBackordered).map(|e| e.quantity).sum();
        prop_assert_eq!(satisfied + backordered, requested);
    }
}
