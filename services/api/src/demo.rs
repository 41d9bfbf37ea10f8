use crate::infra::{memory_directory, MemoryDirectory};
use clap::Args;
use laburar::auth::SignUpRequest;
use laburar::directory::{
    load_into, ContactLinks, EditForm, FormSchema, Listing, ListingFilter, PhoneNumber,
    PublishForm, SampleListings, SignUpForm,
};
use laburar::error::AppError;
use std::path::PathBuf;

#[derive(Args, Debug, Default)]
pub(crate) struct PhoneArgs {
    /// Number as a publisher would type it, e.g. "+54 9 11 3456-7890"
    pub(crate) number: String,
    /// Greeting placed in the WhatsApp link (defaults to the LaburAr greeting)
    #[arg(long)]
    pub(crate) message: Option<String>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// CSV of sample listings to load instead of the bundled set.
    #[arg(long)]
    pub(crate) samples: Option<PathBuf>,
    /// Category to search for in the browse step.
    #[arg(long, default_value = "Plomería")]
    pub(crate) category: String,
}

pub(crate) fn run_phone_check(args: PhoneArgs) {
    let PhoneArgs { number, message } = args;

    match PhoneNumber::parse(&number) {
        Ok(phone) => {
            let links = ContactLinks::for_phone(&phone, message.as_deref());
            println!("Valid WhatsApp number: {}", phone.cleaned());
            println!("  WhatsApp: {}", links.whatsapp);
            println!("  Phone:    {}", links.tel);
        }
        Err(err) => println!("Invalid number '{}': {}", number, err),
    }
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { samples, category } = args;

    println!("LaburAr directory demo");
    let directory = memory_directory();
    let samples = match samples {
        Some(path) => SampleListings::from_path(path)?,
        None => SampleListings::embedded()?,
    };
    let loaded = load_into(directory.repository(), samples).await?;
    println!("Loaded {} sample listings", loaded);

    browse(&directory, "\nAll active listings", &ListingFilter::default()).await;
    browse(
        &directory,
        &format!("\nListings offering {}", category),
        &ListingFilter::default().category(category.as_str()),
    )
    .await;

    println!("\nPublishing without a session");
    match directory.publish(&demo_listing()).await {
        Ok(listing) => println!("  Unexpectedly published {}", listing.id),
        Err(err) => println!("  Rejected: {}", err),
    }

    println!("\nSigning up a publisher");
    let request = match demo_sign_up().validate() {
        Ok(request) => request,
        Err(err) => {
            println!("  Sign-up form rejected: {}", err);
            return Ok(());
        }
    };
    if !sign_up(&directory, &request).await {
        return Ok(());
    }

    let mut invalid = demo_listing();
    invalid.phone = "123".to_string();
    println!("\nPublishing with phone '{}'", invalid.phone);
    if let Err(err) = directory.publish(&invalid).await {
        println!("  Rejected: {}", err);
    }

    println!("\nPublishing a valid listing");
    let listing = match directory.publish(&demo_listing()).await {
        Ok(listing) => listing,
        Err(err) => {
            println!("  Publish failed: {}", err);
            return Ok(());
        }
    };
    render_listing(&listing);
    match directory.contact(&listing.id).await {
        Ok(Some(links)) => {
            println!("  WhatsApp: {}", links.whatsapp);
            println!("  Phone:    {}", links.tel);
        }
        Ok(None) => println!("  Contact links unavailable"),
        Err(err) => println!("  Contact links unavailable: {}", err),
    }

    println!("\nEditing the listing");
    let edit = EditForm {
        neighborhood: Some("Colegiales".to_string()),
        contact_message: Some("Hola! Vi tu aviso en LaburAr y necesito".to_string()),
        ..EditForm::default()
    };
    match directory.edit(&listing.id, &edit).await {
        Ok(updated) => render_listing(&updated),
        Err(err) => println!("  Edit rejected: {}", err),
    }

    println!("\nRemoving the listing");
    match directory.remove(&listing.id).await {
        Ok(()) => println!("  Listing {} is now inactive", listing.id),
        Err(err) => println!("  Removal rejected: {}", err),
    }
    match directory.my_listings().await {
        Ok(mine) => {
            for listing in mine {
                println!("  {} [{}]", listing.name, listing.status.label());
            }
        }
        Err(err) => println!("  Could not load your listings: {}", err),
    }

    if let Err(err) = directory.session().sign_out().await {
        println!("\nSign-out reported: {}", err);
    }
    println!("\nEditing after signing out");
    if let Err(err) = directory.edit(&listing.id, &edit).await {
        println!("  Rejected: {}", err);
    }

    directory.session().close();
    Ok(())
}

async fn sign_up(directory: &MemoryDirectory, request: &SignUpRequest) -> bool {
    match directory.session().sign_up_with_password(request).await {
        Ok(user) => {
            println!("  Signed in as {} <{}>", user.name, user.email);
            true
        }
        Err(err) => {
            println!("  Sign-up failed: {}", err);
            false
        }
    }
}

async fn browse(directory: &MemoryDirectory, heading: &str, filter: &ListingFilter) {
    println!("{}", heading);
    match directory.browse(filter).await {
        Ok(listings) if listings.is_empty() => println!("  (none)"),
        Ok(listings) => {
            for listing in listings {
                println!(
                    "  {} - {} ({}) [{}]",
                    listing.name,
                    listing.city,
                    listing.neighborhood.as_deref().unwrap_or("sin barrio"),
                    listing.categories.join(", ")
                );
            }
        }
        Err(err) => println!("  {}", err),
    }
}

fn render_listing(listing: &Listing) {
    println!(
        "  {} by {} in {}{}",
        listing.id,
        listing.name,
        listing.city,
        listing
            .neighborhood
            .as_deref()
            .map(|neighborhood| format!(", {}", neighborhood))
            .unwrap_or_default()
    );
    println!("  Greeting: {}", listing.contact_message());
}

fn demo_sign_up() -> SignUpForm {
    SignUpForm {
        name: "Lucía Fernández".to_string(),
        email: "lucia.fernandez@gmail.com".to_string(),
        password: "laburar2024".to_string(),
        confirm_password: "laburar2024".to_string(),
    }
}

fn demo_listing() -> PublishForm {
    PublishForm {
        name: "Lucía Fernández".to_string(),
        company: Some("Jardines LF".to_string()),
        city: "Buenos Aires".to_string(),
        neighborhood: Some("Núñez".to_string()),
        phone: "+54 9 11 2345-6789".to_string(),
        email: Some("lucia.fernandez@gmail.com".to_string()),
        categories: vec!["Jardinería".to_string()],
        description: "Diseño y mantenimiento de jardines, poda de árboles y riego automático."
            .to_string(),
        contact_message: None,
        custom_category: None,
    }
}
