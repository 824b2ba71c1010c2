//! Macro-generated test suite for the `LedgerStore` / `LedgerTx` contract.
//!
//! # Usage
//!
//! ```rust,ignore
//! #[macro_use]
//! mod storage_harness;
//!
//! use storage_harness::*;
//! use fynness::storage::InMemoryLedgerStore;
//!
//! ledger_store_tests!(InMemoryLedgerStore::new());
//! ```
//!
//! # Generated Tests
//!
//! ## Transactions
//! - `test_commit_makes_writes_visible`
//! - `test_drop_rolls_back`
//! - `test_reads_inside_tx_see_own_writes`
//!
//! ## Scoping
//! - `test_reads_are_scoped_by_user`
//! - `test_company_scope_filters`
//!
//! ## Records
//! - entries (ordering, queries, delete), plans, cards and invoices,
//!   partners with deductions and draws, cost centers, cash flow
//!
//! ## Maintenance
//! - `test_scopes_lists_every_owner`

/// Generate a full `LedgerStore` conformance test suite.
///
/// `$factory` must be an expression that evaluates to a fresh, empty
/// `LedgerStore`. It is re-evaluated for each test.
#[macro_export]
macro_rules! ledger_store_tests {
    ($factory:expr) => {
        mod ledger_store_contract_tests {
            use super::*;
            use fynness::core::query::{CashFlowQuery, EntryQuery};
            use fynness::core::records::{CashFlowRow, EntryStatus, Invoice, PartnerDrawRecord};
            use fynness::core::store::LedgerStore;
            use rust_decimal_macros::dec;
            use uuid::Uuid;

            // ==================================================================
            // Transactions
            // ==================================================================

            #[tokio::test]
            async fn test_commit_makes_writes_visible() {
                let store = $factory;
                let s = scope();
                let e = entry(&s, dec!(150.00), date(2026, 3, 10));

                let mut tx = store.begin().await.unwrap();
                tx.put_entry(&e).await.unwrap();
                tx.commit().await.unwrap();

                let mut tx = store.begin().await.unwrap();
                let loaded = tx.get_entry(&s, e.id).await.unwrap().unwrap();
                assert_eq!(loaded.id, e.id);
                assert_eq!(loaded.amount, dec!(150.00));
                assert_eq!(loaded.due_date, date(2026, 3, 10));
                assert_eq!(loaded.status, EntryStatus::Pending);
            }

            #[tokio::test]
            async fn test_drop_rolls_back() {
                let store = $factory;
                let s = scope();
                let e = entry(&s, dec!(10), date(2026, 1, 5));

                {
                    let mut tx = store.begin().await.unwrap();
                    tx.put_entry(&e).await.unwrap();
                    tx.put_card(&card(&s)).await.unwrap();
                }

                let mut tx = store.begin().await.unwrap();
                assert!(tx.get_entry(&s, e.id).await.unwrap().is_none());
                assert!(tx.list_cards(&s).await.unwrap().is_empty());
            }

            #[tokio::test]
            async fn test_reads_inside_tx_see_own_writes() {
                let store = $factory;
                let s = scope();
                let mut e = entry(&s, dec!(40), date(2026, 2, 1));

                let mut tx = store.begin().await.unwrap();
                tx.put_entry(&e).await.unwrap();
                e.amount = dec!(45);
                tx.put_entry(&e).await.unwrap();

                let seen = tx.get_entry(&s, e.id).await.unwrap().unwrap();
                assert_eq!(seen.amount, dec!(45));
                let found = tx.find_entries(&s, &EntryQuery::default()).await.unwrap();
                assert_eq!(found.len(), 1);
            }

            // ==================================================================
            // Scoping
            // ==================================================================

            #[tokio::test]
            async fn test_reads_are_scoped_by_user() {
                let store = $factory;
                let owner = scope();
                let stranger = scope();
                let e = entry(&owner, dec!(99), date(2026, 4, 1));
                let c = card(&owner);

                let mut tx = store.begin().await.unwrap();
                tx.put_entry(&e).await.unwrap();
                tx.put_card(&c).await.unwrap();
                tx.commit().await.unwrap();

                let mut tx = store.begin().await.unwrap();
                assert!(tx.get_entry(&stranger, e.id).await.unwrap().is_none());
                assert!(tx.get_card(&stranger, c.id).await.unwrap().is_none());
                assert!(
                    tx.find_entries(&stranger, &EntryQuery::default())
                        .await
                        .unwrap()
                        .is_empty()
                );
                assert!(tx.get_card(&owner, c.id).await.unwrap().is_some());
            }

            #[tokio::test]
            async fn test_company_scope_filters() {
                let store = $factory;
                let user = scope();
                let company_a = user.with_company(Uuid::new_v4());
                let company_b = user.with_company(Uuid::new_v4());

                let in_a = entry(&company_a, dec!(1), date(2026, 1, 1));
                let in_b = entry(&company_b, dec!(2), date(2026, 1, 2));
                let personal = entry(&user, dec!(3), date(2026, 1, 3));

                let mut tx = store.begin().await.unwrap();
                for e in [&in_a, &in_b, &personal] {
                    tx.put_entry(e).await.unwrap();
                }
                tx.commit().await.unwrap();

                let mut tx = store.begin().await.unwrap();
                let all = tx.find_entries(&user, &EntryQuery::default()).await.unwrap();
                assert_eq!(all.len(), 3);

                let only_a = tx
                    .find_entries(&company_a, &EntryQuery::default())
                    .await
                    .unwrap();
                assert_eq!(only_a.len(), 1);
                assert_eq!(only_a[0].id, in_a.id);
                assert!(tx.get_entry(&company_a, in_b.id).await.unwrap().is_none());
                assert!(tx.get_entry(&company_a, personal.id).await.unwrap().is_none());
            }

            // ==================================================================
            // Entries
            // ==================================================================

            #[tokio::test]
            async fn test_find_entries_ordered_by_due_date_then_index() {
                let store = $factory;
                let s = scope();
                let late = entry(&s, dec!(1), date(2026, 5, 20));
                let mut second = entry(&s, dec!(1), date(2026, 5, 1));
                second.installment_index = Some(2);
                second.parent_id = Some(Uuid::new_v4());
                let mut first = entry(&s, dec!(1), date(2026, 5, 1));
                first.installment_index = Some(1);
                first.parent_id = second.parent_id;

                let mut tx = store.begin().await.unwrap();
                for e in [&late, &second, &first] {
                    tx.put_entry(e).await.unwrap();
                }

                let ids: Vec<Uuid> = tx
                    .find_entries(&s, &EntryQuery::default())
                    .await
                    .unwrap()
                    .into_iter()
                    .map(|e| e.id)
                    .collect();
                assert_eq!(ids, vec![first.id, second.id, late.id]);
            }

            #[tokio::test]
            async fn test_find_entries_applies_query() {
                let store = $factory;
                let s = scope();
                let c = card(&s);

                let mut on_card = entry(&s, dec!(30), date(2026, 3, 15));
                on_card.card_id = Some(c.id);
                let mut next_month = entry(&s, dec!(40), date(2026, 4, 15));
                next_month.card_id = Some(c.id);
                let mut canceled = entry(&s, dec!(50), date(2026, 3, 16));
                canceled.card_id = Some(c.id);
                canceled.status = EntryStatus::Canceled;
                let mut header = entry(&s, dec!(90), date(2026, 3, 1));
                header.installment_total = Some(3);
                let untagged = entry(&s, dec!(60), date(2026, 3, 20));

                let mut tx = store.begin().await.unwrap();
                for e in [&on_card, &next_month, &canceled, &header, &untagged] {
                    tx.put_entry(e).await.unwrap();
                }

                let march = tx
                    .find_entries(&s, &EntryQuery::for_card(c.id, period(2026, 3)))
                    .await
                    .unwrap();
                assert_eq!(march.len(), 1);
                assert_eq!(march[0].id, on_card.id);

                let everything = tx.find_entries(&s, &EntryQuery::default()).await.unwrap();
                assert_eq!(everything.len(), 3);

                let with_headers = EntryQuery {
                    include_plan_headers: true,
                    include_canceled: true,
                    ..EntryQuery::default()
                };
                assert_eq!(tx.find_entries(&s, &with_headers).await.unwrap().len(), 5);
            }

            #[tokio::test]
            async fn test_soft_deleted_entries_hidden_by_default() {
                let store = $factory;
                let s = scope();
                let mut e = entry(&s, dec!(12), date(2026, 6, 1));
                e.deleted_at = Some(chrono::Utc::now());

                let mut tx = store.begin().await.unwrap();
                tx.put_entry(&e).await.unwrap();

                assert!(tx.find_entries(&s, &EntryQuery::default()).await.unwrap().is_empty());
                let with_deleted = EntryQuery {
                    include_deleted: true,
                    ..EntryQuery::default()
                };
                assert_eq!(tx.find_entries(&s, &with_deleted).await.unwrap().len(), 1);
                // Direct lookups still resolve soft-deleted entries
                assert!(tx.get_entry(&s, e.id).await.unwrap().is_some());
            }

            #[tokio::test]
            async fn test_delete_entry() {
                let store = $factory;
                let s = scope();
                let e = entry(&s, dec!(5), date(2026, 1, 1));

                let mut tx = store.begin().await.unwrap();
                tx.put_entry(&e).await.unwrap();
                tx.commit().await.unwrap();

                let mut tx = store.begin().await.unwrap();
                tx.delete_entry(e.id).await.unwrap();
                // Unknown ids are a no-op
                tx.delete_entry(Uuid::new_v4()).await.unwrap();
                tx.commit().await.unwrap();

                let mut tx = store.begin().await.unwrap();
                assert!(tx.get_entry(&s, e.id).await.unwrap().is_none());
            }

            // ==================================================================
            // Plans
            // ==================================================================

            #[tokio::test]
            async fn test_plan_lifecycle() {
                let store = $factory;
                let s = scope();
                let mut header = entry(&s, dec!(300), date(2026, 1, 10));
                header.installment_total = Some(3);
                let mut p = plan(&s, &header, dec!(300), 3);
                header.plan_id = Some(p.id);

                let mut tx = store.begin().await.unwrap();
                tx.put_entry(&header).await.unwrap();
                tx.put_plan(&p).await.unwrap();
                tx.commit().await.unwrap();

                let mut tx = store.begin().await.unwrap();
                let loaded = tx.get_plan(&s, p.id).await.unwrap().unwrap();
                assert_eq!(loaded.header_id, header.id);
                assert_eq!(loaded.total, dec!(300));
                assert_eq!(tx.list_plans(&s).await.unwrap().len(), 1);

                p.total = dec!(310);
                tx.put_plan(&p).await.unwrap();
                assert_eq!(tx.get_plan(&s, p.id).await.unwrap().unwrap().total, dec!(310));

                let members = tx.find_entries(&s, &EntryQuery::for_plan(p.id)).await.unwrap();
                assert_eq!(members.len(), 1);

                tx.delete_plan(p.id).await.unwrap();
                tx.commit().await.unwrap();

                let mut tx = store.begin().await.unwrap();
                assert!(tx.get_plan(&s, p.id).await.unwrap().is_none());
                assert!(tx.get_plan(&scope(), p.id).await.unwrap().is_none());
            }

            // ==================================================================
            // Cards and invoices
            // ==================================================================

            #[tokio::test]
            async fn test_invoices_keyed_by_card_and_period() {
                let store = $factory;
                let s = scope();
                let c = card(&s);
                let other = card(&s);

                let mut march = Invoice::open(&c, period(2026, 3));
                march.total = dec!(120.50);
                march.materialized = true;
                let april = Invoice::open(&c, period(2026, 4));
                let elsewhere = Invoice::open(&other, period(2026, 3));

                let mut tx = store.begin().await.unwrap();
                tx.put_card(&c).await.unwrap();
                tx.put_card(&other).await.unwrap();
                for inv in [&april, &march, &elsewhere] {
                    tx.put_invoice(inv).await.unwrap();
                }
                tx.commit().await.unwrap();

                let mut tx = store.begin().await.unwrap();
                let found = tx
                    .find_invoice(&s, c.id, period(2026, 3))
                    .await
                    .unwrap()
                    .unwrap();
                assert_eq!(found.id, march.id);
                assert_eq!(found.total, dec!(120.50));
                assert!(
                    tx.find_invoice(&s, c.id, period(2026, 5))
                        .await
                        .unwrap()
                        .is_none()
                );

                let for_card = tx.list_invoices(&s, Some(c.id)).await.unwrap();
                let periods: Vec<_> = for_card.iter().map(|i| i.period).collect();
                assert_eq!(periods, vec![period(2026, 3), period(2026, 4)]);
                assert_eq!(tx.list_invoices(&s, None).await.unwrap().len(), 3);
                assert_eq!(tx.list_cards(&s).await.unwrap().len(), 2);
            }

            // ==================================================================
            // Partners, deductions and draws
            // ==================================================================

            #[tokio::test]
            async fn test_partner_deductions_and_draws() {
                let store = $factory;
                let s = scope();
                let p = partner(&s, dec!(5000));
                let other = partner(&s, dec!(3000));
                let health = deduction(&p, dec!(450));

                let mut tx = store.begin().await.unwrap();
                tx.put_partner(&p).await.unwrap();
                tx.put_partner(&other).await.unwrap();
                tx.put_deduction(&health).await.unwrap();
                tx.put_deduction(&deduction(&other, dec!(10))).await.unwrap();

                let later = PartnerDrawRecord::compute(&p, period(2026, 2), dec!(450), dec!(0), dec!(0));
                let earlier = PartnerDrawRecord::compute(&p, period(2026, 1), dec!(450), dec!(0), dec!(0));
                tx.put_draw(&later).await.unwrap();
                tx.put_draw(&earlier).await.unwrap();
                tx.commit().await.unwrap();

                let mut tx = store.begin().await.unwrap();
                assert_eq!(tx.list_partners(&s).await.unwrap().len(), 2);
                assert_eq!(
                    tx.get_partner(&s, p.id).await.unwrap().unwrap().base_draw,
                    dec!(5000)
                );

                let deductions = tx.list_deductions(&s, p.id).await.unwrap();
                assert_eq!(deductions.len(), 1);
                assert_eq!(deductions[0].id, health.id);

                let draw = tx.find_draw(&s, p.id, period(2026, 1)).await.unwrap().unwrap();
                assert_eq!(draw.id, earlier.id);
                assert_eq!(draw.net, dec!(4550));
                assert!(tx.find_draw(&s, other.id, period(2026, 1)).await.unwrap().is_none());

                let periods: Vec<_> = tx
                    .list_draws(&s, p.id)
                    .await
                    .unwrap()
                    .into_iter()
                    .map(|d| d.period)
                    .collect();
                assert_eq!(periods, vec![period(2026, 1), period(2026, 2)]);
            }

            // ==================================================================
            // Cost centers
            // ==================================================================

            #[tokio::test]
            async fn test_cost_centers_by_code() {
                let store = $factory;
                let s = scope();
                let mut ops = cost_center(&s, "OPS");
                let adm = cost_center(&s, "ADM");

                let mut tx = store.begin().await.unwrap();
                tx.put_cost_center(&ops).await.unwrap();
                tx.put_cost_center(&adm).await.unwrap();

                ops.projected_total = dec!(75);
                tx.put_cost_center(&ops).await.unwrap();
                tx.commit().await.unwrap();

                let mut tx = store.begin().await.unwrap();
                let found = tx.find_cost_center(&s, "OPS").await.unwrap().unwrap();
                assert_eq!(found.id, ops.id);
                assert_eq!(found.projected_total, dec!(75));
                assert!(tx.find_cost_center(&s, "ops").await.unwrap().is_none());
                assert!(tx.find_cost_center(&scope(), "OPS").await.unwrap().is_none());

                let codes: Vec<String> = tx
                    .list_cost_centers(&s)
                    .await
                    .unwrap()
                    .into_iter()
                    .map(|c| c.code)
                    .collect();
                assert_eq!(codes, vec!["ADM".to_string(), "OPS".to_string()]);
            }

            // ==================================================================
            // Cash flow
            // ==================================================================

            #[tokio::test]
            async fn test_cash_flow_range_and_delete() {
                let store = $factory;
                let s = scope();

                let mut rows = Vec::new();
                for day in [20, 5, 12] {
                    let mut e = entry(&s, dec!(10), date(2026, 7, day));
                    e.status = EntryStatus::Paid;
                    e.paid_at = Some(date(2026, 7, day));
                    rows.push((e.clone(), CashFlowRow::for_entry(&e)));
                }

                let mut tx = store.begin().await.unwrap();
                for (e, row) in &rows {
                    tx.put_entry(e).await.unwrap();
                    tx.put_cash_flow(row).await.unwrap();
                }
                // A second row for the same entry
                tx.put_cash_flow(&CashFlowRow::for_entry(&rows[0].0)).await.unwrap();
                tx.commit().await.unwrap();

                let mut tx = store.begin().await.unwrap();
                let range = CashFlowQuery {
                    from: Some(date(2026, 7, 1)),
                    to: Some(date(2026, 7, 15)),
                    entry_id: None,
                };
                let dates: Vec<_> = tx
                    .find_cash_flow(&s, &range)
                    .await
                    .unwrap()
                    .into_iter()
                    .map(|r| r.date)
                    .collect();
                assert_eq!(dates, vec![date(2026, 7, 5), date(2026, 7, 12)]);

                let removed = tx.delete_cash_flow_for_entry(rows[0].0.id).await.unwrap();
                assert_eq!(removed, 2);
                assert_eq!(tx.delete_cash_flow_for_entry(Uuid::new_v4()).await.unwrap(), 0);
                assert!(
                    tx.find_cash_flow(&s, &CashFlowQuery::for_entry(rows[0].0.id))
                        .await
                        .unwrap()
                        .is_empty()
                );
                assert_eq!(
                    tx.find_cash_flow(&s, &CashFlowQuery::default()).await.unwrap().len(),
                    2
                );
            }

            // ==================================================================
            // Maintenance
            // ==================================================================

            #[tokio::test]
            async fn test_scopes_lists_every_owner() {
                let store = $factory;
                let alice = scope();
                let bob = scope();
                let bob_company = bob.with_company(Uuid::new_v4());

                let mut tx = store.begin().await.unwrap();
                tx.put_entry(&entry(&alice, dec!(1), date(2026, 1, 1))).await.unwrap();
                tx.put_card(&card(&bob)).await.unwrap();
                tx.put_cost_center(&cost_center(&bob_company, "OPS")).await.unwrap();
                tx.commit().await.unwrap();

                let mut tx = store.begin().await.unwrap();
                let scopes = tx.scopes().await.unwrap();
                assert_eq!(scopes.len(), 3);
                assert!(scopes.contains(&alice));
                assert!(scopes.contains(&bob));
                assert!(scopes.contains(&bob_company));
            }
        }
    };
}
