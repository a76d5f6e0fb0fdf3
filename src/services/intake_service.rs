use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, Set,
    TransactionTrait,
};
use sea_orm::ActiveValue::NotSet;

use crate::{
    catalog::{Catalog, SHIPPING_ITEM, Warehouse},
    challenge,
    config::{AppConfig, ChallengeConfig},
    dto::intake::{FieldErrors, FormPage, OrderSubmission},
    entity::{
        Orders,
        inventory_checkout::ActiveModel as CheckoutActive,
        orders::{ActiveModel as OrderActive, Column as OrderCol},
    },
    error::{AppError, AppResult},
    lifecycle::{self, StatusPoint},
    models::{OrderStatus, ShippingAddress, is_session_token},
    services::{
        lifecycle_service,
        stock_service::{StockSnapshot, load_stock},
    },
    state::AppState,
};

/// A submission that passed every check, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedOrder {
    pub warehouse: Warehouse,
    pub address: ShippingAddress,
    pub contact: String,
    /// `(item, quantity, price_each)` for every item with a positive quantity.
    pub lines: Vec<(String, i32, i64)>,
    pub shipping_cost: i64,
}

#[derive(Debug)]
pub enum IntakeOutcome {
    /// The order exists; `created` is false when the token was already used.
    Placed { session_id: String, created: bool },
    Rejected(FormPage),
}

/// Checks a submission against the catalog and the stock read under the intake lock.
pub fn validate(
    submission: &OrderSubmission,
    catalog: &Catalog,
    stock: &StockSnapshot,
    challenge_config: &ChallengeConfig,
) -> Result<ValidatedOrder, FieldErrors> {
    let mut errors = FieldErrors::new();

    let address_complete = submission.recipient.is_some()
        && submission.line1.is_some()
        && submission.city.is_some()
        && submission.country.is_some()
        && submission.warehouse.is_some();
    if !address_complete {
        errors.insert("address", "Please fill in every field marked with *.".into());
    }

    let warehouse = match submission.warehouse.as_deref() {
        Some(code) => match code.parse::<Warehouse>() {
            Ok(w) => Some(w),
            Err(_) => {
                errors.insert("address", "Please pick a shipping region we serve.".into());
                None
            }
        },
        None => None,
    };

    if submission.contact.is_none() {
        errors.insert("contact", "Please tell us how to reach you.".into());
    }

    let mut lines = Vec::new();
    let mut shipping_cost = 0_i64;
    for (item_id, raw) in &submission.quantities {
        let Some(item) = catalog.get(item_id) else {
            continue;
        };
        let Ok(quantity) = raw.parse::<i32>() else {
            errors.insert("items", "Quantities must be whole numbers.".into());
            continue;
        };
        if quantity < 0 {
            errors.insert("items", "Quantities must be whole numbers.".into());
            continue;
        }
        if let Some(warehouse) = warehouse {
            if i64::from(quantity) > stock.available(warehouse, item_id) {
                errors.insert("items", "Some of the items you asked for are out of stock.".into());
                continue;
            }
            shipping_cost += item.shipping.for_warehouse(warehouse) * i64::from(quantity);
        }
        if quantity > 0 {
            lines.push((item_id.clone(), quantity, item.price));
        }
    }
    if lines.is_empty() && !errors.contains_key("items") {
        errors.insert("items", "Please order at least one item.".into());
    }

    let verification_ok = match &challenge_config.verification_answer {
        Some(expected) => submission.verification.as_deref() == Some(expected.as_str()),
        None => true,
    };
    let challenge_ok = challenge::verify(
        &submission.session_id,
        &submission.answer,
        &submission.challenge,
        &challenge_config.salt,
    );
    if !(verification_ok && challenge_ok) {
        errors.insert("captcha", "The picture word does not match. Please try again.".into());
    }

    match warehouse {
        Some(warehouse) if errors.is_empty() => Ok(ValidatedOrder {
            warehouse,
            address: ShippingAddress {
                recipient: submission.recipient.clone().unwrap_or_default(),
                phone: submission.phone.clone(),
                email: submission.email.clone(),
                line1: submission.line1.clone().unwrap_or_default(),
                line2: submission.line2.clone(),
                line3: submission.line3.clone(),
                line4: submission.line4.clone(),
                city: submission.city.clone().unwrap_or_default(),
                zip: submission.zip.clone(),
                country: submission.country.clone().unwrap_or_default(),
            },
            contact: submission.contact.clone().unwrap_or_default(),
            lines,
            shipping_cost,
        }),
        _ => Err(errors),
    }
}

/// Fresh form: new session token and a challenge for a random picture.
pub fn form_page(config: &AppConfig, stock: StockSnapshot, errors: FieldErrors) -> FormPage {
    let session_id = uuid::Uuid::new_v4().simple().to_string();
    let challenge =
        challenge::challenge_hash(&session_id, challenge::random_image(), &config.challenge.salt);
    FormPage {
        session_id,
        challenge,
        catalog: config.catalog.clone(),
        stock,
        errors,
    }
}

pub async fn new_form(state: &AppState) -> AppResult<FormPage> {
    let stock = load_stock(&state.orm, &state.config.catalog).await?;
    Ok(form_page(&state.config, stock, FieldErrors::new()))
}

/// Locks out every other writer of orders and stock for the rest of the transaction.
async fn lock_for_intake<C>(conn: &C) -> AppResult<()>
where
    C: ConnectionTrait,
{
    conn.execute_unprepared(
        "LOCK TABLE orders, status_change, inventory_checkout, inventory_list IN EXCLUSIVE MODE",
    )
    .await?;
    Ok(())
}

pub async fn submit_order(
    state: &AppState,
    submission: OrderSubmission,
    ip: Option<String>,
) -> AppResult<IntakeOutcome> {
    if !is_session_token(&submission.session_id) {
        return Err(AppError::BadRequest("invalid session_id".into()));
    }
    let config = &state.config;

    let txn = state.orm.begin().await?;
    lock_for_intake(&txn).await?;

    let existing = Orders::find()
        .filter(OrderCol::SessionId.eq(submission.session_id.as_str()))
        .count(&txn)
        .await?;
    if existing > 0 {
        txn.commit().await?;
        tracing::debug!(session_id = %submission.session_id, "order already recorded");
        return Ok(IntakeOutcome::Placed {
            session_id: submission.session_id,
            created: false,
        });
    }

    let stock = load_stock(&txn, &config.catalog).await?;
    let order = match validate(&submission, &config.catalog, &stock, &config.challenge) {
        Ok(order) => order,
        Err(errors) => {
            txn.rollback().await?;
            tracing::debug!(fields = ?errors.keys().collect::<Vec<_>>(), "order form rejected");
            return Ok(IntakeOutcome::Rejected(form_page(config, stock, errors)));
        }
    };

    let now = lifecycle::now();
    let address = order.address;
    let created = OrderActive {
        id: NotSet,
        session_id: Set(submission.session_id.clone()),
        warehouse: Set(order.warehouse.code().to_string()),
        address_recipient: Set(address.recipient),
        address_phone: Set(address.phone),
        address_email: Set(address.email),
        address_line1: Set(address.line1),
        address_line2: Set(address.line2),
        address_line3: Set(address.line3),
        address_line4: Set(address.line4),
        address_city: Set(address.city),
        address_zip: Set(address.zip),
        address_country: Set(address.country),
        contact: Set(order.contact),
        expired: Set(false),
        ip: Set(ip),
        reference: Set(None),
        message: Set(None),
        created_at: Set(now.into()),
    }
    .insert(&txn)
    .await?;

    lifecycle_service::append(
        &txn,
        created.id,
        StatusPoint {
            status: OrderStatus::New,
            at: now,
        },
    )
    .await?;

    let shipping_line = (SHIPPING_ITEM.to_string(), 1, order.shipping_cost);
    for (item, quantity, price_each) in order.lines.into_iter().chain([shipping_line]) {
        CheckoutActive {
            id: NotSet,
            order_id: Set(created.id),
            item: Set(item),
            quantity: Set(quantity),
            price_each: Set(price_each),
        }
        .insert(&txn)
        .await?;
    }

    txn.commit().await?;
    tracing::info!(
        order_id = created.id,
        session_id = %created.session_id,
        warehouse = %created.warehouse,
        "order placed"
    );

    Ok(IntakeOutcome::Placed {
        session_id: created.session_id,
        created: true,
    })
}
