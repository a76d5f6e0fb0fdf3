use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub session_id: String,
    pub warehouse: String,
    pub address_recipient: String,
    pub address_phone: Option<String>,
    pub address_email: Option<String>,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub address_line3: Option<String>,
    pub address_line4: Option<String>,
    pub address_city: String,
    pub address_zip: Option<String>,
    pub address_country: String,
    pub contact: String,
    pub expired: bool,
    pub ip: Option<String>,
    pub reference: Option<String>,
    pub message: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::status_change::Entity")]
    StatusChange,
    #[sea_orm(has_many = "super::inventory_checkout::Entity")]
    InventoryCheckout,
}

impl Related<super::status_change::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StatusChange.def()
    }
}

impl Related<super::inventory_checkout::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InventoryCheckout.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
