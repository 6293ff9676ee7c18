use crate::step::{Step, StepResult};
use async_trait::async_trait;
use std::marker::PhantomData;

/// Two steps run in order: `first`'s output is `second`'s input.
///
/// Longer chains nest: `a.then(b).then(c)` or `chain![a, b, c]`. The types
/// line up at compile time, and the first failure stops the chain.
pub struct Chain<A, B> {
    first: A,
    second: B,
}

impl<A, B> Chain<A, B>
where
    A: Step,
    B: Step<Input = A::Output>,
{
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

#[async_trait]
impl<A, B> Step for Chain<A, B>
where
    A: Step,
    B: Step<Input = A::Output>,
{
    type Input = A::Input;
    type Output = B::Output;

    async fn run(&self, input: A::Input) -> StepResult<B::Output> {
        let intermediate = self.first.run(input).await?;
        self.second.run(intermediate).await
    }
}

/// The empty chain: returns its input unchanged.
pub struct Identity<T>(PhantomData<fn(T) -> T>);

impl<T> Identity<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for Identity<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Send + 'static> Step for Identity<T> {
    type Input = T;
    type Output = T;

    async fn run(&self, input: T) -> StepResult<T> {
        Ok(input)
    }

    fn name(&self) -> &str {
        "identity"
    }
}

/// Chain any number of steps left to right.
///
/// ```rust
/// use agent_pipe::{chain, Step, StepFn};
///
/// # let rt = tokio::runtime::Runtime::new().unwrap();
/// # rt.block_on(async {
/// let pipeline = chain![
///     StepFn::new(|x: i32| async move { Ok(x + 1) }),
///     StepFn::new(|x: i32| async move { Ok(x * 10) }),
///     StepFn::new(|x: i32| async move { Ok(x.to_string()) }),
/// ];
/// assert_eq!(pipeline.run(1).await.unwrap(), "20");
/// # });
/// ```
#[macro_export]
macro_rules! chain {
    ($only:expr $(,)?) => {
        $only
    };
    ($first:expr, $($rest:expr),+ $(,)?) => {{
        let chained = $first;
        $(
            let chained = $crate::Chain::new(chained, $rest);
        )+
        chained
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StepError;
    use crate::step::{StepExt, StepFn};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn add(n: i32) -> impl Step<Input = i32, Output = i32> {
        StepFn::new(move |x: i32| async move { Ok(x + n) })
    }

    #[tokio::test]
    async fn chain_of_two_threads_output() {
        let chain = add(1).then(StepFn::new(|x: i32| async move { Ok(x * 3) }));
        assert_eq!(chain.run(2).await.unwrap(), 9);
    }

    #[tokio::test]
    async fn chain_changes_types_along_the_way() {
        let chain = add(4)
            .then(StepFn::new(|x: i32| async move { Ok(format!("n={x}")) }))
            .then(StepFn::new(|s: String| async move { Ok(s.len()) }));
        assert_eq!(chain.run(6).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn chain_matches_running_members_in_order() {
        let members = [1, 2, 3, 4, 5, 6, 7, 8];
        let chain = chain![
            add(members[0]),
            add(members[1]),
            add(members[2]),
            add(members[3]),
            add(members[4]),
            add(members[5]),
            add(members[6]),
            add(members[7]),
        ];

        let mut expected = 100;
        for n in members {
            expected = add(n).run(expected).await.unwrap();
        }
        assert_eq!(chain.run(100).await.unwrap(), expected);
    }

    #[tokio::test]
    async fn first_failure_stops_the_chain() {
        let later = Arc::new(AtomicUsize::new(0));
        let later_clone = Arc::clone(&later);

        let chain = chain![
            add(1),
            StepFn::new(|_: i32| async { Err::<i32, _>(StepError::failed("stop")) }),
            StepFn::new(move |x: i32| {
                let later = Arc::clone(&later_clone);
                async move {
                    later.fetch_add(1, Ordering::SeqCst);
                    Ok(x)
                }
            }),
        ];

        let err = chain.run(0).await.unwrap_err();
        assert!(matches!(err, StepError::Failed(msg) if msg == "stop"));
        assert_eq!(later.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn single_member_chain_is_the_member() {
        let chain = chain![add(5)];
        assert_eq!(chain.run(1).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn identity_returns_input() {
        let id = Identity::<String>::new();
        assert_eq!(id.run("same".into()).await.unwrap(), "same");
    }

    #[tokio::test]
    async fn built_chain_is_reusable() {
        let chain = add(1).then(add(1));
        assert_eq!(chain.run(0).await.unwrap(), 2);
        assert_eq!(chain.run(10).await.unwrap(), 12);
    }
}
