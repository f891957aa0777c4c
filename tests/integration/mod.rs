mod registration;
mod session_sends;
