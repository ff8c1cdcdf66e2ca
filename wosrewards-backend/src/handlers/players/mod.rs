pub mod add;
pub mod list;

pub use add::add_player;
pub use list::list_players;
