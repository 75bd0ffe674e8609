use hyphen::{EvaluationContext, User};

pub fn main() -> hyphen::Result<()> {
    // Configure env_logger to see Hyphen SDK logs.
    env_logger::Builder::from_env(env_logger::Env::new().default_filter_or("hyphen")).init();

    let public_key = std::env::var("HYPHEN_PUBLIC_KEY")
        .expect("HYPHEN_PUBLIC_KEY env variable should contain the public key");
    let application =
        std::env::var("HYPHEN_APPLICATION").unwrap_or_else(|_| "demo-app".to_owned());
    let environment =
        std::env::var("HYPHEN_ENVIRONMENT").unwrap_or_else(|_| "development".to_owned());

    let client = hyphen::ClientConfig::from_public_key(public_key)
        .application(application)
        .environment(environment)
        .to_client()?;

    let context = EvaluationContext::new("demo-user")
        .with_ip_address("203.0.113.7")
        .with_user(User::new("demo-user").with_email("demo@example.com"))
        .with_custom_attribute("subscription_level", "premium");

    // Both calls share a single request thanks to the evaluation cache.
    let enabled = client.get_boolean_value("new-checkout", false, &context);
    let color = client.get_string_value("button-color", "blue", &context);

    println!("new-checkout: {:?}", enabled);
    println!("button-color: {:?}", color);

    match client.get_integer_details("max-items", &context) {
        Ok(details) => println!("max-items: {:?}", details),
        Err(err) => println!("error resolving max-items: {:?}", err),
    }

    // Wait for usage telemetry to be posted before exiting.
    client.shutdown()
}
