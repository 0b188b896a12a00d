pub struct Icons;

impl Icons {
    pub const ROCKET: &str = "🚀";
    pub const CHECK: &str = "✅";
    pub const CROSS: &str = "❌";
    pub const WARN: &str = "⚠️";
    pub const DEL: &str = "🗑️";
    pub const PACKAGE: &str = "📦";
    pub const GEAR: &str = "⚙️";
}
