mod workspace;

pub use workspace::{WorkspaceContext, USER_ID_HEADER, WORKSPACE_ID_HEADER};
