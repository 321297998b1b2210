use uuid::Uuid;

use super::Recipient;
use crate::models::{Booking, Payment, Room, TenantContact};
use crate::store::{StoreError, UnitOfWork};

/// Everything a payment notification talks about
#[derive(Debug, Clone)]
pub struct BillingContext {
    pub payment: Payment,
    pub booking: Option<Booking>,
    pub room: Option<Room>,
    pub tenant: Option<TenantContact>,
}

impl BillingContext {
    pub fn recipient(&self) -> Option<Recipient> {
        self.tenant.clone().map(Recipient::from)
    }

    pub fn room_number(&self) -> Option<String> {
        self.room.as_ref().map(|r| r.number.clone())
    }
}

/// Resolve payment → booking → room and tenant. Missing links stay `None`.
pub async fn load_billing_context(
    uow: &mut dyn UnitOfWork,
    payment_id: Uuid,
) -> Result<Option<BillingContext>, StoreError> {
    let Some(payment) = uow.find_payment(payment_id).await? else {
        return Ok(None);
    };

    let booking = uow.find_booking(payment.booking_id).await?;
    let (room, tenant) = match &booking {
        Some(b) => (
            uow.find_room(b.room_id).await?,
            uow.find_tenant_contact(b.tenant_id).await?,
        ),
        None => (None, None),
    };

    Ok(Some(BillingContext {
        payment,
        booking,
        room,
        tenant,
    }))
}
