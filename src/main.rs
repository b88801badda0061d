use anyhow::Result;
use gridflow::cli::App;

#[tokio::main]
async fn main() -> Result<()> {
    let (app, args) = App::from_args()?;

    app.run(args).await?;

    Ok(())
}
