pub struct Env {
    pub jwt_secret: String,
    pub database_url: String,
    pub frontend_url: String,
    pub ip: String,
    pub port: u16,
    pub attachment_dir: String,
    pub attachment_base_url: String,
    pub max_attachment_bytes: usize,
}

impl Env {
    fn new() -> Self {
        let jwt_secret = std::env::var("SECRET_KEY")
            .expect("SECRET_KEY must be set in .env file or environment variable");

        let database_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set in .env file or environment variable");

        let frontend_url =
            std::env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:5173".to_string());
        let ip = std::env::var("IP").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .expect("PORT must be a valid u16 integer");

        let attachment_dir =
            std::env::var("ATTACHMENT_DIR").unwrap_or_else(|_| "./uploads".to_string());
        let attachment_base_url =
            std::env::var("ATTACHMENT_BASE_URL").unwrap_or_else(|_| "/uploads".to_string());
        let max_attachment_bytes = std::env::var("MAX_ATTACHMENT_BYTES")
            .unwrap_or_else(|_| (10 * 1024 * 1024).to_string())
            .parse::<usize>()
            .expect("MAX_ATTACHMENT_BYTES must be a valid usize integer");

        Env {
            jwt_secret,
            database_url,
            frontend_url,
            ip,
            port,
            attachment_dir,
            attachment_base_url,
            max_attachment_bytes,
        }
    }
}

impl Default for Env {
    fn default() -> Self {
        Self::new()
    }
}
