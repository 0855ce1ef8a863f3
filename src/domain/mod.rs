pub mod cid;
pub mod confirmation;
pub mod field;
pub mod mailing_list;
pub mod subscriber_email;
pub mod subscriber_name;
pub mod subscription;
pub mod subscription_input;
pub mod subscription_status;
