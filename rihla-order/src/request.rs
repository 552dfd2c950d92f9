use chrono::NaiveDate;
use rihla_core::{CoreError, CoreResult, Currency, PriceSnapshot, ResourceKind, ResourceRef};
use rihla_shared::Masked;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{BookingDraft, CustomerContact, PaymentMethod, StayDates};

/// Booking form as submitted by a client, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaceBookingRequest {
    pub booking_type: Option<String>,
    pub flight: Option<Uuid>,
    pub hotel: Option<Uuid>,
    pub event: Option<Uuid>,
    pub quantity: Option<u32>,
    pub total_price_sar: Option<Decimal>,
    pub total_price_usd: Option<Decimal>,
    pub currency: Option<String>,
    pub payment_method: Option<String>,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub special_requests: Option<String>,
    pub check_in_date: Option<NaiveDate>,
    pub check_out_date: Option<NaiveDate>,
}

fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl PlaceBookingRequest {
    /// Turns the form into a draft owned by `user_id`.
    ///
    /// Checks run in this order: booking type and matching resource id, then the
    /// required fields (all missing ones reported together), then value rules.
    pub fn validate(self, user_id: &str) -> CoreResult<BookingDraft> {
        let kind: ResourceKind = present(&self.booking_type)
            .ok_or_else(|| CoreError::Validation("Missing required fields: booking_type".to_string()))?
            .parse()?;
        let resource = ResourceRef::from_parts(kind, self.flight, self.hotel, self.event)?;

        let name = present(&self.customer_name);
        let email = present(&self.customer_email);
        let phone = present(&self.customer_phone);
        let method = present(&self.payment_method);

        let mut missing = Vec::new();
        if name.is_none() {
            missing.push("customer_name");
        }
        if email.is_none() {
            missing.push("customer_email");
        }
        if phone.is_none() {
            missing.push("customer_phone");
        }
        if self.quantity.is_none() {
            missing.push("quantity");
        }
        if self.total_price_sar.is_none() {
            missing.push("total_price_sar");
        }
        if self.total_price_usd.is_none() {
            missing.push("total_price_usd");
        }
        if method.is_none() {
            missing.push("payment_method");
        }

        let (Some(name), Some(email), Some(phone), Some(quantity), Some(sar), Some(usd), Some(method)) = (
            name,
            email,
            phone,
            self.quantity,
            self.total_price_sar,
            self.total_price_usd,
            method,
        ) else {
            return Err(CoreError::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        };

        if quantity == 0 {
            return Err(CoreError::Validation("quantity must be at least 1".to_string()));
        }

        let price = PriceSnapshot::new(sar, usd);
        price.ensure_positive("total price")?;

        if !email.contains('@') {
            return Err(CoreError::Validation("customer_email is not a valid address".to_string()));
        }

        let payment_method: PaymentMethod = method.parse()?;
        let currency = match present(&self.currency) {
            Some(code) => code.parse()?,
            None => Currency::default(),
        };

        let stay = match (kind, self.check_in_date, self.check_out_date) {
            (_, None, None) => None,
            (ResourceKind::Hotel, Some(check_in), Some(check_out)) => {
                if check_out <= check_in {
                    return Err(CoreError::Validation(
                        "check_out_date must be after check_in_date".to_string(),
                    ));
                }
                Some(StayDates { check_in, check_out })
            }
            (ResourceKind::Hotel, _, _) => {
                return Err(CoreError::Validation(
                    "check_in_date and check_out_date must be given together".to_string(),
                ))
            }
            _ => {
                return Err(CoreError::Validation(format!(
                    "stay dates only apply to hotel bookings, not {}",
                    kind
                )))
            }
        };

        Ok(BookingDraft {
            user_id: user_id.to_string(),
            resource,
            quantity,
            price,
            currency,
            payment_method,
            contact: CustomerContact {
                name,
                email: Masked::new(email),
                phone: Masked::new(phone),
            },
            special_requests: present(&self.special_requests),
            stay,
        })
    }
}
