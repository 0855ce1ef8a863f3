use rand::Rng;

const SUBSCRIPTION_CID_LENGTH: usize = 12;
const CONFIRMATION_TOKEN_LENGTH: usize = 30;

/// Public identifier for lists and subscriptions.
pub fn generate_cid() -> String {
    random_alphanumeric(SUBSCRIPTION_CID_LENGTH)
}

/// Unguessable single-use confirmation token.
pub fn generate_confirmation_token() -> String {
    random_alphanumeric(CONFIRMATION_TOKEN_LENGTH)
}

pub fn random_alphanumeric(length: usize) -> String {
    let mut rng = rand::thread_rng();

    std::iter::repeat_with(|| rng.sample(rand::distributions::Alphanumeric))
        .map(char::from)
        .take(length)
        .collect()
}
