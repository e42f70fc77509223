use campus_portal::{
    auth::JwtIdentityProvider,
    config::check_jwt_secret,
    domain::{Category, CreateAnnouncementRequest, CreateUserRequest, Identity, UserRole},
    repository::{
        AnnouncementRepository, SqliteAnnouncementRepository,
        SqliteUserRepository, UserRepository,
    },
};
use clap::Parser;
use fake::{
    faker::{internet::en::SafeEmail, lorem::en::{Paragraph, Sentence}, name::en::Name},
    Fake,
};
use rand::{seq::SliceRandom, Rng};
use sqlx::sqlite::SqlitePoolOptions;

/// Populate a development database with users and announcements.
#[derive(Parser, Debug)]
#[command(name = "seed")]
struct Args {
    /// Database to seed
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://campus-portal.db?mode=rwc")]
    database_url: String,

    /// Number of student accounts to create
    #[arg(long, default_value_t = 12)]
    students: usize,

    /// Number of announcements to publish
    #[arg(long, default_value_t = 30)]
    announcements: usize,

    /// Secret used to mint development tokens for the admin and a student.
    /// Tokens are skipped when it is not given.
    #[arg(long, env = "PORTAL__AUTH__JWT_SECRET")]
    jwt_secret: Option<String>,
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect::<String>().trim().to_string()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    println!("🌱 Starting database seeding...");

    let db_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&args.database_url)
        .await?;

    // Run migrations first
    println!("📋 Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await?;

    let user_repo = SqliteUserRepository::new(db_pool.clone());
    let announcement_repo = SqliteAnnouncementRepository::new(db_pool.clone());
    let mut rng = rand::thread_rng();

    // Seed users
    println!("👥 Creating users...");

    let admin = user_repo.create(CreateUserRequest {
        id: "admin".to_string(),
        display_name: "Campus Administrator".to_string(),
        email: "admin@campus.local".to_string(),
        role: UserRole::Admin,
    }).await?;

    user_repo.create(CreateUserRequest {
        id: "teacher".to_string(),
        display_name: Name().fake(),
        email: "teacher@campus.local".to_string(),
        role: UserRole::Teacher,
    }).await?;

    let mut students = Vec::with_capacity(args.students);
    for i in 0..args.students {
        let email: String = SafeEmail().fake();
        let student = user_repo.create(CreateUserRequest {
            id: format!("student-{}", i + 1),
            display_name: Name().fake(),
            email: format!("{}.{}", i + 1, email),
            role: UserRole::Student,
        }).await?;
        students.push(student);
    }

    println!("  ✅ Created {} users", students.len() + 2);

    // Seed announcements
    println!("📢 Publishing announcements...");

    let mut published = 0;
    for _ in 0..args.announcements {
        let title: String = Sentence(3..8).fake();
        let message: String = Paragraph(1..3).fake();
        let category = *Category::ALL.choose(&mut rng).unwrap_or(&Category::General);

        let id = announcement_repo.create(CreateAnnouncementRequest {
            title: truncate_chars(&title, 100),
            message: truncate_chars(&message, 500),
            category,
        }).await?;

        for student in students.iter() {
            if rng.gen_bool(0.4) {
                announcement_repo.mark_read(id, &student.id).await?;
            }
        }
        published += 1;
    }

    println!("  ✅ Published {} announcements", published);

    match args.jwt_secret.as_deref() {
        Some(secret) => {
            check_jwt_secret(secret)?;
            let tokens = JwtIdentityProvider::new(secret, 24 * 30);
            let admin_token = tokens.issue(&Identity::new(admin.id.clone(), admin.role.claims()))?;
            println!("\n🔑 Development tokens (valid 30 days)");
            println!("  admin:     {}", admin_token);
            if let Some(student) = students.first() {
                let student_token = tokens.issue(&Identity::new(student.id.clone(), student.role.claims()))?;
                println!("  {}: {}", student.id, student_token);
            }
        }
        None => {
            println!("\nℹ️  Set PORTAL__AUTH__JWT_SECRET to print development tokens");
        }
    }

    println!("\n✨ Seeding complete!");
    Ok(())
}
