use serde::Serialize;
use utoipa::ToSchema;

use crate::models::Subscription;

#[derive(Debug, Serialize, ToSchema)]
pub struct SubscriptionList {
    pub items: Vec<Subscription>,
}
