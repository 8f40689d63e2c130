// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::webhook_delivery::DeliveryStatus;
use sea_orm::entity::prelude::*;
use serde_json::Value as JsonValue;

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum SeaDeliveryStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "delivering")]
    Delivering,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "retrying")]
    Retrying,
    #[sea_orm(string_value = "failed")]
    Failed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl From<DeliveryStatus> for SeaDeliveryStatus {
    fn from(status: DeliveryStatus) -> Self {
        match status {
            DeliveryStatus::Pending => SeaDeliveryStatus::Pending,
            DeliveryStatus::Delivering => SeaDeliveryStatus::Delivering,
            DeliveryStatus::Delivered => SeaDeliveryStatus::Delivered,
            DeliveryStatus::Retrying => SeaDeliveryStatus::Retrying,
            DeliveryStatus::Failed => SeaDeliveryStatus::Failed,
            DeliveryStatus::Cancelled => SeaDeliveryStatus::Cancelled,
        }
    }
}

impl From<SeaDeliveryStatus> for DeliveryStatus {
    fn from(status: SeaDeliveryStatus) -> Self {
        match status {
            SeaDeliveryStatus::Pending => DeliveryStatus::Pending,
            SeaDeliveryStatus::Delivering => DeliveryStatus::Delivering,
            SeaDeliveryStatus::Delivered => DeliveryStatus::Delivered,
            SeaDeliveryStatus::Retrying => DeliveryStatus::Retrying,
            SeaDeliveryStatus::Failed => DeliveryStatus::Failed,
            SeaDeliveryStatus::Cancelled => DeliveryStatus::Cancelled,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "webhook_deliveries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub webhook_id: Uuid,
    pub organization_id: Uuid,
    pub event: String,
    pub payload: JsonValue,
    pub status: SeaDeliveryStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub next_retry_at: Option<DateTimeWithTimeZone>,
    pub last_attempt_at: Option<DateTimeWithTimeZone>,
    pub last_attempt_status: Option<i32>,
    pub last_attempt_response: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
    pub completed_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
