mod login;
mod resource_list;
mod splash;

pub use login::LoginView;
pub use resource_list::ResourceListView;
pub use splash::SplashView;
