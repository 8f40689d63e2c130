// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::entity::prelude::*;
use serde_json::Value as JsonValue;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "webhooks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub url: String,
    pub events: JsonValue,
    pub is_active: bool,
    pub secret: Option<String>,
    pub headers: JsonValue,
    pub retry_policy: JsonValue,
    pub delivery_attempts: i64,
    pub last_delivery_attempt: Option<DateTimeWithTimeZone>,
    pub last_successful_delivery: Option<DateTimeWithTimeZone>,
    pub last_failed_delivery: Option<DateTimeWithTimeZone>,
    pub failure_reason: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
