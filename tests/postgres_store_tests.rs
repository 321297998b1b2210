//! Postgres-backed engine tests

#[cfg(test)]
mod tests {
    use futures_util::future::join_all;
    use sqlx::PgPool;
    use std::sync::Arc;
    use uuid::Uuid;

    use kosan_server::booking::BookingService;
    use kosan_server::config::GatewayConfig;
    use kosan_server::error::ApiError;
    use kosan_server::gateway::MidtransGateway;
    use kosan_server::models::{BookingStatus, PaymentStatus, RoomStatus};
    use kosan_server::notify::NotificationDispatcher;
    use kosan_server::payment::{
        Outcome, PaymentSessionService, Settlement, SettlementCoordinator, Transition,
    };
    use kosan_server::store::{NewPayment, PgStore, Store};

    /// Helper to create a migrated test database pool
    async fn setup_test_db() -> PgPool {
        let database_url = std::env::var("TEST_DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/kosan_test".to_string());

        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(8)
            .connect(&database_url)
            .await
            .expect("Failed to connect to test database");
        kosan_server::db::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        kosan_server::db::verify_guard_indexes(&pool)
            .await
            .expect("Guard indexes missing after migrations");
        pool
    }

    async fn seed(pool: &PgPool, price: i64) -> (Uuid, Uuid) {
        let tenant_id = Uuid::new_v4();
        let room_id = Uuid::new_v4();
        sqlx::query("INSERT INTO tenants (id, full_name, email) VALUES ($1, $2, $3)")
            .bind(tenant_id)
            .bind("Test Tenant")
            .bind("tenant@example.com")
            .execute(pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO rooms (id, number, price_per_month) VALUES ($1, $2, $3)")
            .bind(room_id)
            .bind(format!("T-{}", room_id.simple()))
            .bind(price)
            .execute(pool)
            .await
            .unwrap();
        (tenant_id, room_id)
    }

    fn services(pool: &PgPool) -> (Arc<dyn Store>, Arc<BookingService>) {
        let store: Arc<dyn Store> = Arc::new(PgStore::new(pool.clone()));
        let gateway = Arc::new(MidtransGateway::new(&GatewayConfig {
            server_key: String::new(),
            is_production: false,
            timeout: std::time::Duration::from_secs(5),
        }));
        let payments = Arc::new(PaymentSessionService::new(store.clone(), gateway));
        let bookings = Arc::new(BookingService::new(store.clone(), payments));
        (store, bookings)
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_concurrent_bookings_admit_one() {
        let pool = setup_test_db().await;
        let (tenant_id, room_id) = seed(&pool, 1_000_000).await;
        let (_, bookings) = services(&pool);

        let attempts = (0..8).map(|_| {
            let bookings = bookings.clone();
            tokio::spawn(async move {
                bookings
                    .create_booking(tenant_id, room_id, "2026-11-01", 1)
                    .await
            })
        });
        let results: Vec<_> = join_all(attempts)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, ApiError::ActiveBookingExists)));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_open_bill_unique_index() {
        let pool = setup_test_db().await;
        let (tenant_id, room_id) = seed(&pool, 1_000_000).await;
        let (store, bookings) = services(&pool);

        let booking = bookings
            .create_booking(tenant_id, room_id, "2026-11-01", 1)
            .await
            .unwrap();

        let bill = |status| NewPayment {
            booking_id: booking.id,
            amount: 1_000_000,
            dp_amount: 0,
            status,
            method: kosan_server::models::PaymentMethod::Cash,
            kind: kosan_server::models::PaymentType::Full,
            due_date: None,
            external_order_id: None,
            gateway_token: None,
        };

        let mut uow = store.begin().await.unwrap();
        uow.insert_payment(bill(PaymentStatus::Pending)).await.unwrap();
        let clash = uow.insert_payment(bill(PaymentStatus::Rejected)).await;
        assert!(matches!(
            clash,
            Err(kosan_server::store::StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_settlement_cascade_commits() {
        let pool = setup_test_db().await;
        let (tenant_id, room_id) = seed(&pool, 1_000_000).await;
        let (store, bookings) = services(&pool);

        let booking = bookings
            .create_booking(tenant_id, room_id, "2026-11-01", 1)
            .await
            .unwrap();
        let payment = {
            let mut uow = store.begin().await.unwrap();
            let payment = uow
                .insert_payment(NewPayment {
                    booking_id: booking.id,
                    amount: 1_000_000,
                    dp_amount: 0,
                    status: PaymentStatus::Pending,
                    method: kosan_server::models::PaymentMethod::Cash,
                    kind: kosan_server::models::PaymentType::Full,
                    due_date: None,
                    external_order_id: None,
                    gateway_token: None,
                })
                .await
                .unwrap();
            uow.commit().await.unwrap();
            payment
        };

        let notifications = Arc::new(NotificationDispatcher::start(
            store.clone(),
            Vec::new(),
            1,
            4,
            std::time::Duration::from_secs(1),
        ));
        let settlement = SettlementCoordinator::new(store.clone(), notifications.clone());
        settlement
            .settle(payment.id, Outcome::Confirmed { proof_url: None })
            .await
            .unwrap();
        notifications.close().await;

        let mut uow = store.begin().await.unwrap();
        assert_eq!(
            uow.find_payment(payment.id).await.unwrap().unwrap().status,
            PaymentStatus::Confirmed
        );
        assert_eq!(
            uow.find_booking(booking.id).await.unwrap().unwrap().status,
            BookingStatus::Confirmed
        );
        assert_eq!(
            uow.find_room(room_id).await.unwrap().unwrap().status,
            RoomStatus::Full
        );
    }

    async fn pending_gateway_bill(store: &Arc<dyn Store>, booking_id: Uuid) -> Uuid {
        let mut uow = store.begin().await.unwrap();
        let payment = uow
            .insert_payment(NewPayment {
                booking_id,
                amount: 1_000_000,
                dp_amount: 0,
                status: PaymentStatus::Pending,
                method: kosan_server::models::PaymentMethod::Gateway,
                kind: kosan_server::models::PaymentType::Full,
                due_date: None,
                external_order_id: Some(kosan_server::payment::new_order_id()),
                gateway_token: None,
            })
            .await
            .unwrap();
        uow.commit().await.unwrap();
        payment.id
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_racing_settle_and_fail_apply_one_outcome() {
        let pool = setup_test_db().await;
        let (store, bookings) = services(&pool);
        let notifications = Arc::new(NotificationDispatcher::start(
            store.clone(),
            Vec::new(),
            1,
            64,
            std::time::Duration::from_secs(1),
        ));
        let settlement = Arc::new(SettlementCoordinator::new(
            store.clone(),
            notifications.clone(),
        ));

        for _ in 0..20 {
            let (tenant_id, room_id) = seed(&pool, 1_000_000).await;
            let booking = bookings
                .create_booking(tenant_id, room_id, "2026-11-01", 1)
                .await
                .unwrap();
            let payment_id = pending_gateway_bill(&store, booking.id).await;

            let settle = |settlement: Arc<SettlementCoordinator>| {
                tokio::spawn(async move { settlement.settle(payment_id, Outcome::Settled).await })
            };
            let fail = {
                let settlement = settlement.clone();
                tokio::spawn(async move { settlement.fail(payment_id).await })
            };
            let runs = vec![settle(settlement.clone()), fail, settle(settlement.clone())];
            let results: Vec<Settlement> = join_all(runs)
                .await
                .into_iter()
                .map(|r| r.unwrap().unwrap())
                .collect();

            let applied = results
                .iter()
                .filter(|r| r.transition == Transition::Applied)
                .count();
            assert!(applied == 1 || applied == 2, "applied {} times", applied);

            let mut uow = store.begin().await.unwrap();
            let payment = uow.find_payment(payment_id).await.unwrap().unwrap();
            let booking = uow.find_booking(booking.id).await.unwrap().unwrap();
            match payment.status {
                PaymentStatus::Settled => {
                    // Only one settle applied; a fail that ran first was overridden
                    let settles = results
                        .iter()
                        .filter(|r| {
                            r.transition == Transition::Applied
                                && r.payment.status == PaymentStatus::Settled
                        })
                        .count();
                    assert_eq!(settles, 1);
                    assert_eq!(booking.status, BookingStatus::Confirmed);
                }
                other => panic!("payment ended {:?} beside booking {:?}", other, booking.status),
            }
        }

        notifications.close().await;
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_settling_abandoned_booking_after_rebooking() {
        let pool = setup_test_db().await;
        let (tenant_id, room_id) = seed(&pool, 1_000_000).await;
        let (store, bookings) = services(&pool);
        let tenant = kosan_server::models::Principal::tenant(tenant_id);

        let first = bookings
            .create_booking(tenant_id, room_id, "2026-11-01", 1)
            .await
            .unwrap();
        let payment_id = pending_gateway_bill(&store, first.id).await;
        bookings.cancel_booking(first.id, &tenant).await.unwrap();
        let second = bookings
            .create_booking(tenant_id, room_id, "2026-12-01", 1)
            .await
            .unwrap();

        let notifications = Arc::new(NotificationDispatcher::start(
            store.clone(),
            Vec::new(),
            1,
            4,
            std::time::Duration::from_secs(1),
        ));
        let settlement = SettlementCoordinator::new(store.clone(), notifications.clone());
        let result = settlement.settle(payment_id, Outcome::Settled).await.unwrap();
        notifications.close().await;

        assert_eq!(result.transition, Transition::Applied);
        let mut uow = store.begin().await.unwrap();
        assert_eq!(
            uow.find_payment(payment_id).await.unwrap().unwrap().status,
            PaymentStatus::Settled
        );
        assert_eq!(
            uow.find_booking(first.id).await.unwrap().unwrap().status,
            BookingStatus::Cancelled
        );
        assert_eq!(
            uow.find_booking(second.id).await.unwrap().unwrap().status,
            BookingStatus::Pending
        );
    }
}
