use crate::upstream::UpstreamKind;

pub mod server;

mod run;

#[derive(Debug)]
pub enum Action {
    Server(server::Args),
}

impl Action {
    #[must_use]
    pub fn upstream(&self) -> UpstreamKind {
        match self {
            Self::Server(args) => args.upstream,
        }
    }

    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
