//! HTTP integration test macro for storage backends.
//!
//! The `ledger_api_tests!` macro drives the full server through
//! `axum_test::TestServer`:
//! JSON → HTTP request → handler → LedgerService → LedgerStore → HTTP response.
//!
//! Amounts are sent as decimal strings and read back with [`super::money`].

/// Generate an HTTP test suite for a storage backend.
///
/// `$factory` must produce an `impl LedgerStore + 'static`, fresh for each
/// test.
///
/// # Generated Tests
///
/// - entries: create / get / list envelope / update / pay / reverse / cancel / delete
/// - installment plans: even split, installment edit, header rules, delete
/// - cards: invoice totals, the all-or-nothing invoice payment, closed paid windows
/// - partners: real-time draw, commit, pay, locked payment entry
/// - cost centers and the cash-flow report
/// - reconciliation over the caller's scope
#[macro_export]
macro_rules! ledger_api_tests {
    ($factory:expr) => {
        mod ledger_api_tests {
            use super::*;
            use axum::http::StatusCode;
            use axum_test::{TestRequest, TestServer};
            use fynness::server::ServerBuilder;
            use rust_decimal_macros::dec;
            use serde_json::{Value, json};
            use uuid::Uuid;

            /// Test server plus the caller identity sent on every request
            struct Api {
                server: TestServer,
                user: Uuid,
                company: Option<Uuid>,
            }

            impl Api {
                fn scoped(&self, request: TestRequest) -> TestRequest {
                    let request = request.add_header(user_header(), header_value(self.user));
                    match self.company {
                        Some(company) => request.add_header(company_header(), header_value(company)),
                        None => request,
                    }
                }

                fn get(&self, path: &str) -> TestRequest {
                    self.scoped(self.server.get(path))
                }

                fn post(&self, path: &str) -> TestRequest {
                    self.scoped(self.server.post(path))
                }

                fn put(&self, path: &str) -> TestRequest {
                    self.scoped(self.server.put(path))
                }

                fn delete(&self, path: &str) -> TestRequest {
                    self.scoped(self.server.delete(path))
                }

                async fn create_entry(&self, body: Value) -> Value {
                    let response = self.post("/entries").json(&body).await;
                    response.assert_status(StatusCode::CREATED);
                    response.json()
                }

                async fn create_card(&self) -> Uuid {
                    let response = self
                        .post("/cards")
                        .json(&json!({ "name": "Nubank PJ", "closing_day": 3, "due_day": 10 }))
                        .await;
                    response.assert_status(StatusCode::CREATED);
                    id_of(&response.json())
                }
            }

            async fn make_api() -> Api {
                let store = $factory;
                let router = ServerBuilder::new().with_store(store).build().unwrap();
                Api {
                    server: TestServer::new(router),
                    user: Uuid::new_v4(),
                    company: None,
                }
            }

            fn payable(amount: &str, due: &str) -> Value {
                json!({
                    "kind": "payable",
                    "description": "Aluguel",
                    "amount": amount,
                    "due_date": due,
                })
            }

            // ==============================================================
            // Health
            // ==============================================================

            #[tokio::test]
            async fn test_health_reports_backend() {
                let api = make_api().await;
                let response = api.server.get("/health").await;
                response.assert_status_ok();
                let body: Value = response.json();
                assert_eq!(body["status"], "ok");
                assert!(body["storage"].as_str().is_some());
            }

            // ==============================================================
            // Entries
            // ==============================================================

            #[tokio::test]
            async fn test_create_and_get_entry() {
                let api = make_api().await;
                let created = api.create_entry(payable("1500.00", "2026-03-05")).await;
                assert_eq!(created["status"], "pending");
                assert_eq!(money(&created["amount"]), dec!(1500.00));

                let response = api.get(&format!("/entries/{}", id_of(&created))).await;
                response.assert_status_ok();
                let body: Value = response.json();
                assert_eq!(body["description"], "Aluguel");
                assert_eq!(body["due_date"], "2026-03-05");
            }

            #[tokio::test]
            async fn test_entries_are_scoped_to_caller() {
                let mut api = make_api().await;
                let created = api.create_entry(payable("10", "2026-01-10")).await;

                api.user = Uuid::new_v4();
                api.get(&format!("/entries/{}", id_of(&created)))
                    .await
                    .assert_status(StatusCode::NOT_FOUND);

                let list: Value = api.get("/entries").await.json();
                assert_eq!(list["pagination"]["total"], 0);
            }

            #[tokio::test]
            async fn test_list_entries_paginated_and_filtered() {
                let api = make_api().await;
                for day in 1..=5 {
                    api.create_entry(payable("10", &format!("2026-04-0{}", day))).await;
                }
                api.create_entry(payable("10", "2026-05-01")).await;

                let response = api
                    .get("/entries?due_from=2026-04-01&due_to=2026-04-30&page=2&limit=2")
                    .await;
                response.assert_status_ok();
                let body: Value = response.json();
                assert_eq!(body["pagination"]["total"], 5);
                assert_eq!(body["pagination"]["total_pages"], 3);
                assert_eq!(body["pagination"]["has_prev"], true);
                let data = body["data"].as_array().unwrap();
                assert_eq!(data.len(), 2);
                assert_eq!(data[0]["due_date"], "2026-04-03");
                assert_eq!(data[1]["due_date"], "2026-04-04");
            }

            #[tokio::test]
            async fn test_update_entry_clears_nullable_fields() {
                let api = make_api().await;
                let mut body = payable("80", "2026-02-01");
                body["category"] = json!("utilities");
                let created = api.create_entry(body).await;
                let path = format!("/entries/{}", id_of(&created));

                let response = api
                    .put(&path)
                    .json(&json!({ "amount": "95.90", "category": null }))
                    .await;
                response.assert_status_ok();
                let updated: Value = response.json();
                assert_eq!(money(&updated["amount"]), dec!(95.90));
                assert!(updated["category"].is_null());
                assert_eq!(updated["description"], "Aluguel");
            }

            #[tokio::test]
            async fn test_pay_reverse_and_cash_flow() {
                let api = make_api().await;
                let created = api.create_entry(payable("200.00", "2026-06-10")).await;
                let id = id_of(&created);

                let response = api
                    .post(&format!("/entries/{}/pay", id))
                    .json(&json!({
                        "paid_at": "2026-06-12",
                        "paid_amount": "198.40",
                        "include_in_cash_flow": true
                    }))
                    .await;
                response.assert_status_ok();
                let paid: Value = response.json();
                assert_eq!(paid["status"], "paid");
                assert_eq!(money(&paid["amount"]), dec!(200.00));
                assert_eq!(money(&paid["paid_amount"]), dec!(198.40));

                let report: Value = api
                    .get("/cash-flow?from=2026-06-01&to=2026-06-30")
                    .await
                    .json();
                assert_eq!(report["rows"].as_array().unwrap().len(), 1);
                assert_eq!(report["rows"][0]["date"], "2026-06-12");
                assert_eq!(money(&report["summary"]["outflow"]), dec!(198.40));
                assert_eq!(money(&report["summary"]["net"]), dec!(-198.40));

                let again = api.post(&format!("/entries/{}/pay", id)).await;
                again.assert_status(StatusCode::CONFLICT);
                assert_eq!(again.json::<Value>()["code"], "ENTRY_ALREADY_PAID");

                let reversed = api.post(&format!("/entries/{}/reverse", id)).await;
                reversed.assert_status_ok();
                assert_eq!(reversed.json::<Value>()["status"], "pending");

                let report: Value = api.get("/cash-flow").await.json();
                assert!(report["rows"].as_array().unwrap().is_empty());
            }

            #[tokio::test]
            async fn test_pay_without_body_uses_defaults() {
                let api = make_api().await;
                let created = api.create_entry(payable("50", "2026-01-20")).await;

                let response = api.post(&format!("/entries/{}/pay", id_of(&created))).await;
                response.assert_status_ok();
                let paid: Value = response.json();
                assert_eq!(paid["status"], "paid");
                assert!(paid["paid_at"].as_str().is_some());
                assert_eq!(paid["in_cash_flow"], false);
            }

            #[tokio::test]
            async fn test_cancel_then_pay_is_rejected() {
                let api = make_api().await;
                let created = api.create_entry(payable("75", "2026-08-01")).await;
                let id = id_of(&created);

                api.post(&format!("/entries/{}/cancel", id))
                    .await
                    .assert_status_ok();

                let response = api.post(&format!("/entries/{}/pay", id)).await;
                response.assert_status(StatusCode::CONFLICT);
                assert_eq!(response.json::<Value>()["code"], "INVALID_TRANSITION");

                let list: Value = api.get("/entries").await.json();
                assert_eq!(list["pagination"]["total"], 0);
                let with_canceled: Value = api.get("/entries?include_canceled=true").await.json();
                assert_eq!(with_canceled["pagination"]["total"], 1);
            }

            #[tokio::test]
            async fn test_delete_entry_soft_when_cash_flow_references_it() {
                let api = make_api().await;
                let plain = api.create_entry(payable("10", "2026-02-01")).await;
                let flowing = api.create_entry(payable("20", "2026-02-02")).await;
                api.post(&format!("/entries/{}/pay", id_of(&flowing)))
                    .json(&json!({ "include_in_cash_flow": true }))
                    .await
                    .assert_status_ok();

                let hard: Value = api
                    .delete(&format!("/entries/{}", id_of(&plain)))
                    .await
                    .json();
                assert_eq!(hard["soft"], false);

                let soft: Value = api
                    .delete(&format!("/entries/{}", id_of(&flowing)))
                    .await
                    .json();
                assert_eq!(soft["soft"], true);

                api.get(&format!("/entries/{}", id_of(&flowing)))
                    .await
                    .assert_status(StatusCode::NOT_FOUND);
                let report: Value = api.get("/cash-flow").await.json();
                assert_eq!(report["rows"].as_array().unwrap().len(), 1);
            }

            // ==============================================================
            // Installment plans
            // ==============================================================

            #[tokio::test]
            async fn test_plan_split_and_installment_edit() {
                let api = make_api().await;
                let response = api
                    .post("/plans")
                    .json(&json!({
                        "description": "Notebook",
                        "total": "1000.00",
                        "count": 3,
                        "first_due_date": "2026-01-31"
                    }))
                    .await;
                response.assert_status(StatusCode::CREATED);
                let view: Value = response.json();
                let plan_id = view["plan"]["id"].as_str().unwrap().to_string();

                let installments = view["installments"].as_array().unwrap();
                let amounts: Vec<_> = installments.iter().map(|e| money(&e["amount"])).collect();
                assert_eq!(amounts, vec![dec!(333.33), dec!(333.33), dec!(333.34)]);
                let dues: Vec<_> = installments.iter().map(|e| e["due_date"].clone()).collect();
                assert_eq!(dues, vec![json!("2026-01-31"), json!("2026-02-28"), json!("2026-03-31")]);
                assert_eq!(money(&view["header"]["amount"]), dec!(1000.00));

                let response = api
                    .put(&format!("/plans/{}/installments/2", plan_id))
                    .json(&json!({ "amount": "400.00" }))
                    .await;
                response.assert_status_ok();
                let view: Value = response.json();
                assert_eq!(money(&view["plan"]["total"]), dec!(1066.67));
                assert_eq!(money(&view["header"]["amount"]), dec!(1066.67));

                let page: Value = api
                    .get(&format!("/plans/{}/installments?limit=2", plan_id))
                    .await
                    .json();
                assert_eq!(page["pagination"]["total"], 3);
                assert_eq!(page["data"][0]["installment_index"], 1);
            }

            #[tokio::test]
            async fn test_plan_header_rules() {
                let api = make_api().await;
                let view: Value = api
                    .post("/plans")
                    .json(&json!({
                        "description": "Cadeiras",
                        "total": "600",
                        "count": 2,
                        "first_due_date": "2026-05-10"
                    }))
                    .await
                    .json();
                let header_id = id_of(&view["header"]);
                let plan_id = id_of(&view["plan"]);
                let first_id = id_of(&view["installments"][0]);

                let pay = api.post(&format!("/entries/{}/pay", header_id)).await;
                pay.assert_status(StatusCode::BAD_REQUEST);
                assert_eq!(pay.json::<Value>()["code"], "PLAN_HEADER_NOT_PAYABLE");

                let delete_child = api.delete(&format!("/entries/{}", first_id)).await;
                delete_child.assert_status(StatusCode::CONFLICT);
                assert_eq!(delete_child.json::<Value>()["code"], "INSTALLMENT_NOT_DELETABLE");

                api.post(&format!("/entries/{}/pay", first_id))
                    .await
                    .assert_status_ok();
                let delete_plan = api.delete(&format!("/plans/{}", plan_id)).await;
                delete_plan.assert_status(StatusCode::CONFLICT);
                assert_eq!(delete_plan.json::<Value>()["code"], "PLAN_HAS_PAID_INSTALLMENTS");

                api.post(&format!("/entries/{}/reverse", first_id))
                    .await
                    .assert_status_ok();
                api.delete(&format!("/plans/{}", plan_id))
                    .await
                    .assert_status(StatusCode::NO_CONTENT);
                api.get(&format!("/plans/{}", plan_id))
                    .await
                    .assert_status(StatusCode::NOT_FOUND);
            }

            #[tokio::test]
            async fn test_plan_rejects_bad_count() {
                let api = make_api().await;
                let response = api
                    .post("/plans")
                    .json(&json!({
                        "description": "x",
                        "total": "100",
                        "count": 0,
                        "first_due_date": "2026-05-10"
                    }))
                    .await;
                response.assert_status(StatusCode::BAD_REQUEST);
                assert_eq!(response.json::<Value>()["code"], "VALIDATION_ERROR");
            }

            // ==============================================================
            // Cards and invoices
            // ==============================================================

            #[tokio::test]
            async fn test_invoice_total_and_payment() {
                let api = make_api().await;
                let card_id = api.create_card().await;

                for (amount, due) in [("100.00", "2026-03-05"), ("50.25", "2026-03-28")] {
                    let mut body = payable(amount, due);
                    body["card_id"] = json!(card_id);
                    api.create_entry(body).await;
                }
                let mut april = payable("999", "2026-04-01");
                april["card_id"] = json!(card_id);
                api.create_entry(april).await;

                let invoice: Value = api
                    .get(&format!("/cards/{}/invoices/2026/3", card_id))
                    .await
                    .json();
                assert_eq!(money(&invoice["total"]), dec!(150.25));
                assert_eq!(invoice["entry_count"], 2);
                assert_eq!(invoice["due_date"], "2026-03-10");

                let response = api
                    .post(&format!("/cards/{}/invoices/2026/3/pay", card_id))
                    .json(&json!({ "paid_at": "2026-03-10", "include_in_cash_flow": true }))
                    .await;
                response.assert_status_ok();
                let payment: Value = response.json();
                assert_eq!(payment["invoice"]["paid"], true);
                assert_eq!(payment["settled_entries"], 2);
                assert_eq!(money(&payment["payment_entry"]["amount"]), dec!(150.25));
                assert!(payment["payment_entry"]["card_id"].is_null());

                let pending: Value = api
                    .get(&format!("/entries?card_id={}&status=pending", card_id))
                    .await
                    .json();
                assert_eq!(pending["pagination"]["total"], 1);

                let again = api
                    .post(&format!("/cards/{}/invoices/2026/3/pay", card_id))
                    .await;
                again.assert_status(StatusCode::CONFLICT);
                assert_eq!(again.json::<Value>()["code"], "INVOICE_ALREADY_PAID");

                let consolidated = id_of(&payment["payment_entry"]);
                let reverse = api.post(&format!("/entries/{}/reverse", consolidated)).await;
                reverse.assert_status(StatusCode::CONFLICT);
                assert_eq!(reverse.json::<Value>()["code"], "ENTRY_SETTLES_INVOICE");

                let stored: Value = api
                    .get(&format!("/cards/{}/invoices", card_id))
                    .await
                    .json();
                // March (paid) and April (kept current by the entry writes)
                assert_eq!(stored["pagination"]["total"], 2);
                assert_eq!(stored["data"][0]["paid"], true);
            }

            #[tokio::test]
            async fn test_card_charges_settle_only_through_invoice() {
                let api = make_api().await;
                let card_id = api.create_card().await;
                let mut body = payable("50", "2026-05-06");
                body["card_id"] = json!(card_id);
                let charge = id_of(&api.create_entry(body).await);

                let direct = api
                    .post(&format!("/entries/{}/pay", charge))
                    .json(&json!({ "include_in_cash_flow": true }))
                    .await;
                direct.assert_status(StatusCode::CONFLICT);
                assert_eq!(direct.json::<Value>()["code"], "CHARGED_TO_CARD");

                api.post(&format!("/cards/{}/invoices/2026/5/pay", card_id))
                    .json(&json!({ "paid_at": "2026-05-10", "include_in_cash_flow": true }))
                    .await
                    .assert_status_ok();

                let reverse = api.post(&format!("/entries/{}/reverse", charge)).await;
                reverse.assert_status(StatusCode::CONFLICT);
                assert_eq!(reverse.json::<Value>()["code"], "CHARGED_TO_CARD");

                let mut late = payable("70", "2026-05-20");
                late["card_id"] = json!(card_id);
                let response = api.post("/entries").json(&late).await;
                response.assert_status(StatusCode::CONFLICT);
                assert_eq!(response.json::<Value>()["code"], "INVOICE_CLOSED");

                let invoice: Value = api
                    .get(&format!("/cards/{}/invoices/2026/5", card_id))
                    .await
                    .json();
                assert_eq!(money(&invoice["total"]), dec!(50));

                let flow: Value = api.get("/cash-flow").await.json();
                assert_eq!(flow["rows"].as_array().unwrap().len(), 1);
                assert_eq!(money(&flow["summary"]["outflow"]), dec!(50));
            }

            #[tokio::test]
            async fn test_empty_invoice_cannot_be_paid() {
                let api = make_api().await;
                let card_id = api.create_card().await;

                let response = api
                    .post(&format!("/cards/{}/invoices/2026/7/pay", card_id))
                    .await;
                response.assert_status(StatusCode::BAD_REQUEST);
                assert_eq!(response.json::<Value>()["code"], "EMPTY_INVOICE");
            }

            #[tokio::test]
            async fn test_invoice_follows_entry_changes() {
                let api = make_api().await;
                let card_id = api.create_card().await;
                let mut body = payable("40", "2026-09-15");
                body["card_id"] = json!(card_id);
                let created = api.create_entry(body).await;

                api.post(&format!("/cards/{}/invoices/2026/9/recompute", card_id))
                    .await
                    .assert_status_ok();

                api.put(&format!("/entries/{}", id_of(&created)))
                    .json(&json!({ "amount": "65" }))
                    .await
                    .assert_status_ok();

                let stored: Value = api
                    .get(&format!("/cards/{}/invoices", card_id))
                    .await
                    .json();
                assert_eq!(money(&stored["data"][0]["total"]), dec!(65));
            }

            #[tokio::test]
            async fn test_invalid_period_in_path() {
                let api = make_api().await;
                let card_id = api.create_card().await;
                let response = api
                    .get(&format!("/cards/{}/invoices/2026/13", card_id))
                    .await;
                response.assert_status(StatusCode::BAD_REQUEST);
            }

            // ==============================================================
            // Partners and draws
            // ==============================================================

            #[tokio::test]
            async fn test_draw_compute_commit_and_pay() {
                let api = make_api().await;
                let response = api
                    .post("/partners")
                    .json(&json!({ "name": "Ana", "base_draw": "5000.00" }))
                    .await;
                response.assert_status(StatusCode::CREATED);
                let partner_id = id_of(&response.json());

                api.post(&format!("/partners/{}/deductions", partner_id))
                    .json(&json!({ "description": "Plano de saúde", "amount": "450.00" }))
                    .await
                    .assert_status(StatusCode::CREATED);

                let mut ad_hoc = payable("100.00", "2025-01-15");
                ad_hoc["partner_id"] = json!(partner_id);
                api.create_entry(ad_hoc).await;

                let draw: Value = api
                    .get(&format!("/partners/{}/draws/2025/1", partner_id))
                    .await
                    .json();
                assert_eq!(money(&draw["net"]), dec!(4450.00));
                assert_eq!(draw["real_time"], true);
                assert_eq!(draw["committed"], false);
                assert_eq!(draw["month_closed"], true);

                let response = api
                    .post(&format!("/partners/{}/draws/2025/1/commit", partner_id))
                    .await;
                response.assert_status_ok();
                assert_eq!(response.json::<Value>()["committed"], true);

                let payment: Value = api
                    .post(&format!("/partners/{}/draws/2025/1/pay", partner_id))
                    .json(&json!({ "paid_at": "2025-02-05", "include_in_cash_flow": true }))
                    .await
                    .json();
                assert_eq!(payment["draw"]["paid"], true);
                assert_eq!(money(&payment["payment_entry"]["amount"]), dec!(4450.00));
                assert!(payment["payment_entry"]["partner_id"].is_null());

                let again = api
                    .post(&format!("/partners/{}/draws/2025/1/pay", partner_id))
                    .await;
                again.assert_status(StatusCode::CONFLICT);
                assert_eq!(again.json::<Value>()["code"], "DRAW_ALREADY_SETTLED");

                let booked = id_of(&payment["payment_entry"]);
                let reverse = api.post(&format!("/entries/{}/reverse", booked)).await;
                reverse.assert_status(StatusCode::CONFLICT);
                assert_eq!(reverse.json::<Value>()["code"], "ENTRY_SETTLES_DRAW");
                let delete = api.delete(&format!("/entries/{}", booked)).await;
                delete.assert_status(StatusCode::CONFLICT);
                assert_eq!(delete.json::<Value>()["code"], "ENTRY_SETTLES_DRAW");

                let history: Value = api
                    .get(&format!("/partners/{}/draws", partner_id))
                    .await
                    .json();
                assert_eq!(history["pagination"]["total"], 1);
            }

            #[tokio::test]
            async fn test_future_draw_cannot_be_committed() {
                let api = make_api().await;
                let partner: Value = api
                    .post("/partners")
                    .json(&json!({ "name": "Bruno", "base_draw": "3000" }))
                    .await
                    .json();

                let response = api
                    .post(&format!("/partners/{}/draws/2999/1/commit", id_of(&partner)))
                    .await;
                response.assert_status(StatusCode::BAD_REQUEST);
                assert_eq!(response.json::<Value>()["code"], "FUTURE_PERIOD");
            }

            #[tokio::test]
            async fn test_deactivated_deduction_stops_counting() {
                let api = make_api().await;
                let partner: Value = api
                    .post("/partners")
                    .json(&json!({ "name": "Carla", "base_draw": "2000" }))
                    .await
                    .json();
                let partner_id = id_of(&partner);
                let deduction: Value = api
                    .post(&format!("/partners/{}/deductions", partner_id))
                    .json(&json!({ "description": "INSS", "amount": "220" }))
                    .await
                    .json();

                let path = format!("/partners/{}/deductions/{}", partner_id, id_of(&deduction));
                api.delete(&path).await.assert_status_ok();
                api.delete(&path).await.assert_status(StatusCode::CONFLICT);

                let draw: Value = api
                    .get(&format!("/partners/{}/draws/2025/6", partner_id))
                    .await
                    .json();
                assert_eq!(money(&draw["net"]), dec!(2000));
            }

            // ==============================================================
            // Cost centers
            // ==============================================================

            #[tokio::test]
            async fn test_cost_center_totals() {
                let api = make_api().await;
                api.post("/cost-centers")
                    .json(&json!({ "code": "OPS", "name": "Operações", "kind": "expense" }))
                    .await
                    .assert_status(StatusCode::CREATED);

                let duplicate = api
                    .post("/cost-centers")
                    .json(&json!({ "code": "OPS", "name": "Again", "kind": "expense" }))
                    .await;
                duplicate.assert_status(StatusCode::CONFLICT);
                assert_eq!(duplicate.json::<Value>()["code"], "DUPLICATE_KEY");

                let mut body = payable("200.00", "2026-02-10");
                body["cost_center"] = json!("OPS");
                let created = api.create_entry(body).await;
                api.post(&format!("/entries/{}/pay", id_of(&created)))
                    .json(&json!({ "paid_amount": "180.00" }))
                    .await
                    .assert_status_ok();

                let center: Value = api.get("/cost-centers/OPS").await.json();
                assert_eq!(money(&center["projected_total"]), dec!(200.00));
                assert_eq!(money(&center["actual_total"]), dec!(180.00));

                let mut unknown = payable("1", "2026-02-10");
                unknown["cost_center"] = json!("NOPE");
                api.post("/entries")
                    .json(&unknown)
                    .await
                    .assert_status(StatusCode::BAD_REQUEST);
            }

            // ==============================================================
            // Reconciliation
            // ==============================================================

            #[tokio::test]
            async fn test_reconcile_is_clean_after_normal_operations() {
                let api = make_api().await;
                let card_id = api.create_card().await;
                let mut body = payable("30", "2026-03-12");
                body["card_id"] = json!(card_id);
                api.create_entry(body).await;

                let response = api.post("/maintenance/reconcile").await;
                response.assert_status_ok();
                let report: Value = response.json();
                assert_eq!(report["scopes"], 1);
                assert!(report["invoices_checked"].as_u64().unwrap() >= 1);
                assert!(report["corrections"].as_array().unwrap().is_empty());
            }

            // ==============================================================
            // Company scope
            // ==============================================================

            #[tokio::test]
            async fn test_company_header_narrows_scope() {
                let mut api = make_api().await;
                api.create_entry(payable("1", "2026-01-01")).await;

                api.company = Some(Uuid::new_v4());
                api.create_entry(payable("2", "2026-01-02")).await;
                let narrowed: Value = api.get("/entries").await.json();
                assert_eq!(narrowed["pagination"]["total"], 1);

                api.company = None;
                let all: Value = api.get("/entries").await.json();
                assert_eq!(all["pagination"]["total"], 2);
            }
        }
    };
}
